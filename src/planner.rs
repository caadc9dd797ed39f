//! Speed planning and hysteresis

use crate::profile::Profile;

/// Minimum change, in percentage points, worth sending to the fans
pub const HYSTERESIS_THRESHOLD: u8 = 3;

/// Compute the target duty percentage for the hottest CPU using linear interpolation.
///
/// No readings means the temperature is unknown and is treated as worst case.
pub fn plan(cpu_temperatures: &[f64], profile: &Profile) -> u8 {
    let Some(hottest) = cpu_temperatures.iter().copied().reduce(f64::max) else {
        return profile.max_speed;
    };

    if hottest <= profile.target_temp {
        return profile.min_speed;
    }
    if hottest >= profile.max_temp {
        return profile.max_speed;
    }

    let min_speed = profile.min_speed as f64;
    let max_speed = profile.max_speed as f64;
    let factor = (hottest - profile.target_temp) / (profile.max_temp - profile.target_temp);
    let interpolated = min_speed + (max_speed - min_speed) * factor;

    interpolated.round() as u8
}

/// Decide whether a candidate speed differs enough from the last applied one
pub fn should_apply(candidate: u8, last_applied: Option<u8>) -> bool {
    match last_applied {
        None => true,
        Some(last) => candidate.abs_diff(last) > HYSTERESIS_THRESHOLD,
    }
}
