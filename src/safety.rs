//! Ambient temperature protection

use crate::profile::{ControlConfig, Profile, DEFAULT_PROFILE_KEY, QUIET_PROFILE_KEY};
use log::warn;
use std::borrow::Cow;

/// Inlet temperature above which the quiet profile is not allowed, in °C
pub const AMBIENT_LIMIT: f64 = 40.0;

/// Profile actually used for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveProfile<'a> {
    pub profile: &'a Profile,
    pub label: Cow<'a, str>,
    pub forced: bool,
}

/// Swap the quiet profile for the normal one while the inlet is too hot.
///
/// Only the returned value changes; the configuration and its active key are untouched.
pub fn apply_override<'a>(
    ambient: Option<f64>,
    selected_key: &str,
    selected: &'a Profile,
    config: &'a ControlConfig,
) -> EffectiveProfile<'a> {
    let too_hot = ambient.is_some_and(|t| t > AMBIENT_LIMIT);

    if too_hot && selected_key == QUIET_PROFILE_KEY {
        match config
            .profile(DEFAULT_PROFILE_KEY)
            .and_then(|normal| normal.validate().map(|()| normal))
        {
            Ok(normal) => {
                return EffectiveProfile {
                    profile: normal,
                    label: Cow::Owned(format!("{} (forced)", normal.label)),
                    forced: true,
                }
            }
            Err(e) => warn!(
                "SAFETY: Ambient above {}°C but cannot force '{}' ({}), keeping '{}'",
                AMBIENT_LIMIT, DEFAULT_PROFILE_KEY, e, selected_key
            ),
        }
    }

    EffectiveProfile {
        profile: selected,
        label: Cow::Borrowed(selected.label.as_str()),
        forced: false,
    }
}
