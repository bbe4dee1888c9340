use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::capture::PrimingMode;
use crate::util::paths::{config_path, default_artifact_path};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

pub const OUTPUT_ENV: &str = "JITCAP_OUTPUT";
pub const PRIMING_ENV: &str = "JITCAP_PRIMING";
pub const CAPTURE_CODE_ENV: &str = "JITCAP_CAPTURE_CODE";
pub const RECORD_PROCESS_NAME_ENV: &str = "JITCAP_RECORD_PROCESS_NAME";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Artifact every record is appended to
    pub output_path: PathBuf,
    pub priming: PrimingMode,
    /// Snapshot generated code on success
    pub capture_code: bool,
    pub record_process_name: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_path: default_artifact_path(),
            priming: PrimingMode::Full,
            capture_code: true,
            record_process_name: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TomlCaptureSection {
    pub output: Option<PathBuf>,
    pub priming: Option<PrimingMode>,
    pub capture_code: Option<bool>,
    pub record_process_name: Option<bool>,
}

/// On-disk shape of `config.toml`; every value optional.
#[derive(Debug, Default, Deserialize)]
pub struct TomlCaptureConfig {
    pub capture: Option<TomlCaptureSection>,
}

impl CaptureConfig {
    /// Load `config.toml` from the data directory, then apply environment
    /// overrides. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_path(&config_path())?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults merged with the file at `path`, if it exists. No environment.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config: TomlCaptureConfig = toml::from_str(contents)?;
        let mut config = Self::default();
        if let Some(capture) = toml_config.capture {
            config.merge(capture);
        }
        Ok(config)
    }

    fn merge(&mut self, capture: TomlCaptureSection) {
        if let Some(output) = capture.output {
            self.output_path = output;
        }
        if let Some(priming) = capture.priming {
            self.priming = priming;
        }
        if let Some(capture_code) = capture.capture_code {
            self.capture_code = capture_code;
        }
        if let Some(record_process_name) = capture.record_process_name {
            self.record_process_name = record_process_name;
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source shaped like the environment.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(output) = lookup(OUTPUT_ENV).filter(|v| !v.is_empty()) {
            self.output_path = PathBuf::from(output);
        }
        if let Some(value) = lookup(PRIMING_ENV) {
            self.priming = PrimingMode::parse(&value).ok_or(ConfigError::InvalidValue {
                key: PRIMING_ENV,
                value,
            })?;
        }
        if let Some(value) = lookup(CAPTURE_CODE_ENV) {
            self.capture_code = parse_bool(CAPTURE_CODE_ENV, value)?;
        }
        if let Some(value) = lookup(RECORD_PROCESS_NAME_ENV) {
            self.record_process_name = parse_bool(RECORD_PROCESS_NAME_ENV, value)?;
        }
        Ok(())
    }

    /// Write the example config to `path` unless a file is already there.
    /// Returns whether a file was written.
    pub fn write_example(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, EXAMPLE_CONFIG).map_err(io_err)?;
        Ok(true)
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}
