//! Configuration validation.

use libm::fabsf;

use crate::error::{ConfigError, Error, Result};

use super::axis::{Axis, AxisConfig};
use super::machine::{KinematicsKind, MachineConfig};
use super::motor::{MotorConfig, MotorMap};

/// Validate a machine configuration.
///
/// Checks:
/// - Axis names are known and axis limits are positive
/// - Soft limits are valid (min < max)
/// - Motors map to configured axes and have sane geometry
/// - CoreXY has exactly one A and one B motor with equal resolution
/// - No motor needs more than one step per generator tick at full speed
/// - A segment spans at least two ticks
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    let planner = &config.planner;

    if !positive(planner.cornering_tolerance) {
        return Err(Error::Config(ConfigError::InvalidCorneringTolerance(
            planner.cornering_tolerance,
        )));
    }

    let ticks_per_segment = planner.segment_time_us as u64 * planner.tick_hz as u64 / 1_000_000;
    if ticks_per_segment < 2 {
        return Err(Error::Config(ConfigError::InvalidSegmentTime {
            segment_time_us: planner.segment_time_us,
            tick_hz: planner.tick_hz,
        }));
    }

    for (name, axis) in config.axes.iter() {
        if Axis::from_name(name.as_str()).is_none() {
            let name = heapless::String::try_from(name.as_str()).unwrap_or_default();
            return Err(Error::Config(ConfigError::UnknownAxis(name)));
        }
        validate_axis(axis)?;
    }

    for motor in config.motors.iter() {
        validate_motor(motor, config)?;
    }

    if planner.kinematics == KinematicsKind::CoreXy {
        validate_core_xy(config)?;
    } else if config
        .motors
        .iter()
        .any(|m| matches!(m.axis, MotorMap::CoreXyA | MotorMap::CoreXyB))
    {
        return Err(Error::Config(ConfigError::InvalidCoreXy));
    }

    validate_step_rate(config)?;

    let spindle = &config.spindle;
    if spindle.speed_min < 0.0 || !(spindle.speed_max > spindle.speed_min) {
        return Err(Error::Config(ConfigError::InvalidSpindleRange {
            min: spindle.speed_min,
            max: spindle.speed_max,
        }));
    }

    Ok(())
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn validate_axis(axis: &AxisConfig) -> Result<()> {
    // Max velocity must be positive
    if !positive(axis.max_velocity.0) {
        return Err(Error::Config(ConfigError::InvalidMaxVelocity(axis.max_velocity.0)));
    }

    if !positive(axis.feedrate().0) {
        return Err(Error::Config(ConfigError::InvalidMaxVelocity(axis.feedrate().0)));
    }

    // Max acceleration must be positive
    if !positive(axis.max_acceleration.0) {
        return Err(Error::Config(ConfigError::InvalidMaxAcceleration(
            axis.max_acceleration.0,
        )));
    }

    if !positive(axis.max_jerk.0) {
        return Err(Error::Config(ConfigError::InvalidMaxJerk(axis.max_jerk.0)));
    }

    // Soft limits: min must be < max
    if let Some(ref limits) = axis.limits {
        if !limits.is_valid() {
            return Err(Error::Config(ConfigError::InvalidSoftLimits {
                min: limits.min.0,
                max: limits.max.0,
            }));
        }
    }

    Ok(())
}

fn validate_motor(motor: &MotorConfig, config: &MachineConfig) -> Result<()> {
    if !positive(motor.step_angle) || !positive(motor.travel_per_rev) {
        return Err(Error::Config(ConfigError::InvalidMotorGeometry {
            step_angle: motor.step_angle,
            travel_per_rev: motor.travel_per_rev,
        }));
    }

    for &axis in motor.axis.axes() {
        if config.axis(axis).is_none() {
            let name = heapless::String::try_from(axis.name()).unwrap_or_default();
            return Err(Error::Config(ConfigError::UnconfiguredAxis(name)));
        }
    }

    Ok(())
}

fn validate_core_xy(config: &MachineConfig) -> Result<()> {
    let mut a = config.motors.iter().filter(|m| m.axis == MotorMap::CoreXyA);
    let mut b = config.motors.iter().filter(|m| m.axis == MotorMap::CoreXyB);

    match (a.next(), a.next(), b.next(), b.next()) {
        (Some(ma), None, Some(mb), None)
            if fabsf(ma.steps_per_mm() - mb.steps_per_mm()) <= 1e-3 * ma.steps_per_mm() =>
        {
            Ok(())
        }
        _ => Err(Error::Config(ConfigError::InvalidCoreXy)),
    }
}

fn validate_step_rate(config: &MachineConfig) -> Result<()> {
    let tick_hz = config.planner.tick_hz as f32;

    for (index, motor) in config.motors.iter().enumerate() {
        // Worst case: every contributing axis at its fastest ceiling at once.
        let rate: f32 = motor
            .axis
            .axes()
            .iter()
            .filter_map(|&axis| config.axis(axis))
            .map(|a| a.max_velocity.per_sec().max(a.feedrate().per_sec()))
            .sum();

        let steps_per_tick = rate * motor.steps_per_mm() / tick_hz;
        if steps_per_tick > 1.0 {
            return Err(Error::Config(ConfigError::StepRateTooHigh {
                motor: index,
                steps_per_tick,
            }));
        }
    }

    Ok(())
}
