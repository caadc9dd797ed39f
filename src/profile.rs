//! Cooling profiles and the persisted auto-control configuration

use crate::errors::{FanControlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Profile key used whenever the configured one cannot be resolved
pub const DEFAULT_PROFILE_KEY: &str = "normal";

/// Profile key designating minimal cooling
pub const QUIET_PROFILE_KEY: &str = "silence";

/// Poll interval used when the document does not specify one
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

/// A named set of control thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub label: String,
    pub min_speed: u8,
    pub max_speed: u8,
    pub target_temp: f64,
    pub max_temp: f64,
}

impl Profile {
    pub fn new(label: &str, min_speed: u8, max_speed: u8, target_temp: f64, max_temp: f64) -> Self {
        Self {
            label: label.to_string(),
            min_speed,
            max_speed,
            target_temp,
            max_temp,
        }
    }

    pub fn silence() -> Self {
        Self::new("Silence", 10, 40, 55.0, 70.0)
    }

    pub fn normal() -> Self {
        Self::new("Normal", 20, 70, 50.0, 65.0)
    }

    pub fn turbo() -> Self {
        Self::new("Turbo", 40, 100, 40.0, 55.0)
    }

    /// Check `min_speed <= max_speed <= 100` and `target_temp < max_temp`
    pub fn validate(&self) -> Result<()> {
        if self.min_speed > self.max_speed || self.max_speed > 100 {
            return Err(FanControlError::Config(format!(
                "profile '{}': speeds must satisfy minSpeed <= maxSpeed <= 100 (got {}..{})",
                self.label, self.min_speed, self.max_speed
            )));
        }
        if self.target_temp >= self.max_temp {
            return Err(FanControlError::Config(format!(
                "profile '{}': targetTemp {} must be below maxTemp {}",
                self.label, self.target_temp, self.max_temp
            )));
        }
        Ok(())
    }
}

/// Auto-control document shared with the web panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "profile", default = "default_profile_key")]
    pub active_profile_key: String,
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

fn default_profile_key() -> String {
    DEFAULT_PROFILE_KEY.to_string()
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

impl Default for ControlConfig {
    fn default() -> Self {
        let profiles = BTreeMap::from([
            (QUIET_PROFILE_KEY.to_string(), Profile::silence()),
            (DEFAULT_PROFILE_KEY.to_string(), Profile::normal()),
            ("turbo".to_string(), Profile::turbo()),
        ]);

        Self {
            enabled: false,
            active_profile_key: default_profile_key(),
            profiles,
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
        }
    }
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    /// Reject documents the loop cannot use at all.
    ///
    /// Broken profiles only warn here; they fail when a cycle resolves them.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval == 0 {
            return Err(FanControlError::Config(
                "checkInterval must be at least 1 second".to_string(),
            ));
        }
        for (key, profile) in &self.profiles {
            if let Err(e) = profile.validate() {
                log::warn!("Ignoring profile '{}': {}", key, e);
            }
        }
        Ok(())
    }

    pub fn profile(&self, key: &str) -> Result<&Profile> {
        self.profiles
            .get(key)
            .ok_or_else(|| FanControlError::InvalidProfileReference { key: key.to_string() })
    }

    /// Resolve the active profile, falling back to `normal` when the key is unknown.
    ///
    /// Returns the key that was actually used alongside the profile. Fails when
    /// neither is present or the resolved profile is malformed.
    pub fn resolve_active(&self) -> Result<(&str, &Profile)> {
        let (key, profile) = match self.profiles.get_key_value(&self.active_profile_key) {
            Some((key, profile)) => (key.as_str(), profile),
            None => {
                log::warn!(
                    "Profile '{}' not found, falling back to '{}'",
                    self.active_profile_key,
                    DEFAULT_PROFILE_KEY
                );
                (DEFAULT_PROFILE_KEY, self.profile(DEFAULT_PROFILE_KEY)?)
            }
        };
        profile.validate()?;
        Ok((key, profile))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: ControlConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write through a temporary file and rename so readers never see a partial document
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            FanControlError::Io(e)
        })?;
        Ok(())
    }
}

/// Source of the control configuration, read once per cycle
pub trait ControlConfigSource {
    fn load(&self) -> Result<ControlConfig>;
}

/// Control configuration stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    path: std::path::PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlConfigSource for JsonConfigFile {
    fn load(&self) -> Result<ControlConfig> {
        if !self.path.exists() {
            return Err(FanControlError::ConfigUnavailable(format!(
                "{} not found",
                self.path.display()
            )));
        }
        ControlConfig::load_from_file(&self.path).map_err(|e| {
            FanControlError::ConfigUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}
