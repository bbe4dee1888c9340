//! Path utilities for jitcap data directories

use std::path::PathBuf;
use std::sync::OnceLock;

/// Environment variable naming the data directory.
pub const HOME_ENV: &str = "JITCAP_HOME";

/// Global storage for custom data directory path
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Must be called early in main() before any other path functions are used.
/// If custom_path is None, uses `$JITCAP_HOME` or ~/.jitcap.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(default_data_dir);
    if DATA_DIR.set(path.clone()).is_err() {
        let existing = DATA_DIR
            .get()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        tracing::debug!(
            path = %path.display(),
            existing = %existing,
            "Data directory already initialized"
        );
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|h| h.join(".jitcap"))
        .unwrap_or_else(|| PathBuf::from(".jitcap"))
}

/// Get the base data directory.
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Get the config file path (~/.jitcap/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Get the captures directory (~/.jitcap/captures)
pub fn captures_dir() -> PathBuf {
    data_dir().join("captures")
}

/// Get the default artifact path (~/.jitcap/captures/capture.jsonl)
pub fn default_artifact_path() -> PathBuf {
    captures_dir().join("capture.jsonl")
}
