//! Machine constraints derived from configuration.

use heapless::Vec;
use libm::fabsf;

use super::axis::Axis;
use super::limits::SoftLimits;
use super::machine::{KinematicsKind, MachineConfig};
use super::motor::MotorMap;
use super::validation::validate_config;
use crate::error::Result;
use crate::{AXES, MOTORS};

/// Axis limits in planner units (mm, seconds).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisConstraints {
    /// Axis has a configuration entry.
    pub enabled: bool,
    /// Traverse ceiling in mm/s.
    pub max_velocity: f32,
    /// Feed ceiling in mm/s.
    pub max_feedrate: f32,
    /// Acceleration ceiling in mm/s².
    pub max_acceleration: f32,
    /// Jerk ceiling in mm/s³.
    pub max_jerk: f32,
    /// Optional travel limits.
    pub limits: Option<SoftLimits>,
}

/// Motor parameters used for step conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorConstraints {
    /// Axis mapping.
    pub map: MotorMap,
    /// Steps per millimetre.
    pub steps_per_mm: f32,
    /// Invert direction pin logic.
    pub invert_direction: bool,
}

/// Limits of the travel direction of one move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionLimits {
    /// Velocity ceiling along the move in mm/s.
    pub velocity: f32,
    /// Acceleration ceiling along the move in mm/s².
    pub acceleration: f32,
    /// Jerk ceiling along the move in mm/s³.
    pub jerk: f32,
}

/// Derived parameters computed once from configuration and used for all planning.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineConstraints {
    /// Per-axis limits.
    pub axes: [AxisConstraints; AXES],
    /// Motors in output order.
    pub motors: Vec<MotorConstraints, MOTORS>,
    /// Motor/axis coupling.
    pub kinematics: KinematicsKind,
    /// Junction deviation in mm.
    pub cornering_tolerance: f32,
    /// Nominal segment duration in seconds.
    pub segment_time: f32,
    /// Pulse generator tick rate.
    pub tick_hz: u32,
    /// Shortest accepted move in mm.
    pub min_block_length: f32,
}

impl MachineConstraints {
    /// Validate a configuration and convert it to planner units.
    pub fn from_config(config: &MachineConfig) -> Result<Self> {
        validate_config(config)?;

        let mut axes = [AxisConstraints::default(); AXES];
        for axis in Axis::ALL {
            if let Some(cfg) = config.axis(axis) {
                axes[axis.index()] = AxisConstraints {
                    enabled: true,
                    max_velocity: cfg.max_velocity.per_sec(),
                    max_feedrate: cfg.feedrate().per_sec(),
                    max_acceleration: cfg.max_acceleration.0,
                    max_jerk: cfg.max_jerk.0,
                    limits: cfg.limits,
                };
            }
        }

        let motors = config
            .motors
            .iter()
            .map(|m| MotorConstraints {
                map: m.axis,
                steps_per_mm: m.steps_per_mm(),
                invert_direction: m.invert_direction,
            })
            .collect();

        Ok(Self {
            axes,
            motors,
            kinematics: config.planner.kinematics,
            cornering_tolerance: config.planner.cornering_tolerance,
            segment_time: config.planner.segment_time_us as f32 * 1e-6,
            tick_hz: config.planner.tick_hz,
            min_block_length: config.planner.min_block_length,
        })
    }

    /// Number of configured motors.
    #[inline]
    pub fn motor_count(&self) -> usize {
        self.motors.len()
    }

    /// Project per-axis limits onto a unit direction of travel.
    ///
    /// The binding axis is the one giving the smallest scalar limit. Axes
    /// with no displacement do not constrain the move.
    pub fn limits_along(&self, unit: &[f32; AXES], traverse: bool) -> DirectionLimits {
        let mut limits = DirectionLimits {
            velocity: f32::INFINITY,
            acceleration: f32::INFINITY,
            jerk: f32::INFINITY,
        };

        for (axis, &u) in self.axes.iter().zip(unit.iter()) {
            let u = fabsf(u);
            if u <= f32::EPSILON || !axis.enabled {
                continue;
            }
            let velocity = if traverse { axis.max_velocity } else { axis.max_feedrate };
            limits.velocity = limits.velocity.min(velocity / u);
            limits.acceleration = limits.acceleration.min(axis.max_acceleration / u);
            limits.jerk = limits.jerk.min(axis.max_jerk / u);
        }

        limits
    }
}
