//! iLO Fan Control
//!
//! Periodically reads chassis temperatures from an HPE iLO, derives a fan duty cycle
//! from the selected cooling profile and pushes it to every fan over the iLO shell.

pub mod actuator;
pub mod args;
pub mod client;
pub mod daemon;
pub mod errors;
pub mod logging;
pub mod planner;
pub mod profile;
pub mod safety;
pub mod settings;
pub mod telemetry;
pub mod zones;

// Re-export commonly used types
pub use errors::{FanControlError, Result};
pub use profile::{ControlConfig, Profile};
pub use settings::Settings;
pub use telemetry::{SensorCategory, SensorReading, TelemetrySnapshot};
