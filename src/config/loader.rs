//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::MachineConfig;

/// Load machine settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
///
/// ```rust,ignore
/// use stepper_planner::load_config;
///
/// let config = load_config("machine.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MachineConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = heapless::String::try_from(e.to_string().as_str()).unwrap_or_default();
        Error::Config(ConfigError::IoError(msg))
    })?;

    parse_config(&content)
}

/// Parse machine settings from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<MachineConfig> {
    let config: MachineConfig = toml::from_str(content).map_err(|e| {
        let msg = heapless::String::try_from(truncate(e.message(), 128)).unwrap_or_default();
        Error::Config(ConfigError::ParseError(msg))
    })?;

    // Validate the configuration
    super::validation::validate_config(&config)?;

    Ok(config)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Axis, KinematicsKind, LimitPolicy};

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[axes.x]
max_velocity_mm_per_min = 1500.0
max_acceleration_mm_per_sec2 = 500.0
max_jerk_mm_per_sec3 = 5000.0

[[motors]]
axis = "x"
travel_per_rev_mm = 4.0
microsteps = 8
"#;

        let config = parse_config(toml).unwrap();
        assert!(config.axis(Axis::X).is_some());
        assert_eq!(config.motors.len(), 1);
        assert_eq!(config.planner.tick_hz, 50_000);
        assert!(config.spindle.pause_on_hold);
    }

    #[test]
    fn test_parse_core_xy_with_limits() {
        let toml = r#"
[planner]
kinematics = "core_xy"
cornering_tolerance_mm = 0.02

[axes.x]
max_velocity_mm_per_min = 1500.0
max_feedrate_mm_per_min = 1000.0
max_acceleration_mm_per_sec2 = 500.0
max_jerk_mm_per_sec3 = 5000.0
[axes.x.limits]
min_mm = 0.0
max_mm = 280.0
policy = "clamp"

[axes.y]
max_velocity_mm_per_min = 1500.0
max_acceleration_mm_per_sec2 = 500.0
max_jerk_mm_per_sec3 = 5000.0

[[motors]]
axis = "core_xy_a"
travel_per_rev_mm = 40.0
microsteps = 16

[[motors]]
axis = "core_xy_b"
travel_per_rev_mm = 40.0
microsteps = 16
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.planner.kinematics, KinematicsKind::CoreXy);
        let x = config.axis(Axis::X).unwrap();
        assert_eq!(x.limits.unwrap().policy, LimitPolicy::Clamp);
    }

    #[test]
    fn test_parse_rejects_bad_microsteps() {
        let toml = r#"
[axes.x]
max_velocity_mm_per_min = 1500.0
max_acceleration_mm_per_sec2 = 500.0
max_jerk_mm_per_sec3 = 5000.0

[[motors]]
axis = "x"
travel_per_rev_mm = 4.0
microsteps = 12
"#;

        assert!(matches!(
            parse_config(toml),
            Err(Error::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_axis() {
        let toml = r#"
[axes.w]
max_velocity_mm_per_min = 1500.0
max_acceleration_mm_per_sec2 = 500.0
max_jerk_mm_per_sec3 = 5000.0
"#;

        assert!(matches!(
            parse_config(toml),
            Err(Error::Config(ConfigError::UnknownAxis(_)))
        ));
    }
}
