//! Error types for the fan control daemon

use thiserror::Error;

/// Result type alias for the fan control daemon
pub type Result<T> = std::result::Result<T, FanControlError>;

/// Main error type for the fan control daemon
#[derive(Error, Debug)]
pub enum FanControlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Control configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("Telemetry unavailable: {0}")]
    TelemetryUnavailable(String),

    #[error("Could not open command session: {0}")]
    ActuationConnection(String),

    #[error("Profile not found: {key}")]
    InvalidProfileReference { key: String },

    #[error("Invalid fan speed {speed}%: must be between {minimum}% and 100%")]
    InvalidSpeed { speed: u8, minimum: u8 },

    #[error("Daemon already running with PID {pid}")]
    AlreadyRunning { pid: i32 },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl FanControlError {
    /// Whether this error leaves the process able to keep running
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FanControlError::AlreadyRunning { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_second_instance_is_fatal() {
        assert!(!FanControlError::AlreadyRunning { pid: 42 }.is_recoverable());
        assert!(FanControlError::TelemetryUnavailable("timeout".into()).is_recoverable());
        assert!(FanControlError::ActuationConnection("refused".into()).is_recoverable());
        assert!(FanControlError::ConfigUnavailable("missing".into()).is_recoverable());
    }

    #[test]
    fn speed_error_names_bounds() {
        let err = FanControlError::InvalidSpeed { speed: 5, minimum: 10 };
        assert_eq!(
            err.to_string(),
            "Invalid fan speed 5%: must be between 10% and 100%"
        );
    }
}
