//! Utility modules

pub mod paths;

pub use paths::{captures_dir, config_path, data_dir, default_artifact_path, init_data_dir};
