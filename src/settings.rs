//! Daemon settings: management interface address, credentials and timeouts

use crate::errors::{FanControlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for reaching the iLO and running the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// iLO address; `https://` is assumed unless a scheme is given
    pub host: String,
    pub username: String,
    pub password: String,
    pub ssh_port: u16,
    /// Lowest duty cycle ever sent to the fans, in percent
    pub minimum_fan_speed: u8,
    /// iLO ships with a self-signed certificate; set to false once a trusted one is installed
    pub accept_invalid_certs: bool,
    pub control_config: PathBuf,
    pub pid_file: PathBuf,
    pub telemetry_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub fan_pause_millis: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            ssh_port: 22,
            minimum_fan_speed: 10,
            accept_invalid_certs: true,
            control_config: PathBuf::from("auto-control.json"),
            pid_file: PathBuf::from("fan-daemon.pid"),
            telemetry_timeout_secs: 10,
            command_timeout_secs: 2,
            fan_pause_millis: 50,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        PathBuf::from("/etc/ilo-fan-control/settings.json")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            FanControlError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&json)?;
        Ok(settings)
    }

    /// Load an explicitly given file, or the default one when present
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from_file(&path)
                } else {
                    log::debug!("{} not found, using built-in defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply command line overrides on top of the file values
    pub fn with_overrides(mut self, host: Option<String>, username: Option<String>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(username) = username {
            self.username = username;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(FanControlError::Config("host must not be empty".to_string()));
        }
        if self.minimum_fan_speed > 100 {
            return Err(FanControlError::Config(format!(
                "minimumFanSpeed must be between 0 and 100 (got {})",
                self.minimum_fan_speed
            )));
        }
        if self.telemetry_timeout_secs == 0 || self.command_timeout_secs == 0 {
            return Err(FanControlError::Config(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_secs(self.telemetry_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn fan_pause(&self) -> Duration {
        Duration::from_millis(self.fan_pause_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"host": "192.168.1.69", "username": "Administrator", "password": "secret"}"#,
        )
        .unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.host, "192.168.1.69");
        assert_eq!(settings.ssh_port, 22);
        assert_eq!(settings.minimum_fan_speed, 10);
        assert!(settings.accept_invalid_certs);
        assert_eq!(settings.telemetry_timeout(), Duration::from_secs(10));
        assert_eq!(settings.command_timeout(), Duration::from_secs(2));
        assert_eq!(settings.fan_pause(), Duration::from_millis(50));
        settings.validate().unwrap();
    }

    #[test]
    fn overrides_replace_file_values() {
        let settings = Settings::default()
            .with_overrides(Some("ilo.lan".to_string()), None);
        assert_eq!(settings.host, "ilo.lan");
        assert_eq!(settings.username, "");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Settings::default().validate().is_err());

        let mut settings = Settings::default().with_overrides(Some("ilo".into()), None);
        settings.minimum_fan_speed = 120;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default().with_overrides(Some("ilo".into()), None);
        settings.command_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Settings::load_from_file(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, FanControlError::Config(_)));
    }
}
