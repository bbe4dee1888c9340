mod settings;

pub use settings::{
    CaptureConfig, ConfigError, TomlCaptureConfig, TomlCaptureSection, CAPTURE_CODE_ENV,
    EXAMPLE_CONFIG, OUTPUT_ENV, PRIMING_ENV, RECORD_PROCESS_NAME_ENV,
};
