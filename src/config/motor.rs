//! Motor configuration from TOML.

use serde::Deserialize;

use super::axis::Axis;
use super::units::Microsteps;

/// Which axis (or coupled axis pair) a motor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorMap {
    /// Directly drives X
    X,
    /// Directly drives Y
    Y,
    /// Directly drives Z
    Z,
    /// Directly drives A
    A,
    /// Directly drives B
    B,
    /// Directly drives C
    C,
    /// CoreXY belt motor A (X + Y)
    CoreXyA,
    /// CoreXY belt motor B (X - Y)
    CoreXyB,
}

impl MotorMap {
    /// Axis driven directly, or `None` for coupled CoreXY motors.
    pub fn direct_axis(self) -> Option<Axis> {
        match self {
            MotorMap::X => Some(Axis::X),
            MotorMap::Y => Some(Axis::Y),
            MotorMap::Z => Some(Axis::Z),
            MotorMap::A => Some(Axis::A),
            MotorMap::B => Some(Axis::B),
            MotorMap::C => Some(Axis::C),
            MotorMap::CoreXyA | MotorMap::CoreXyB => None,
        }
    }

    /// Axes this motor contributes to.
    pub fn axes(self) -> &'static [Axis] {
        match self {
            MotorMap::X => &[Axis::X],
            MotorMap::Y => &[Axis::Y],
            MotorMap::Z => &[Axis::Z],
            MotorMap::A => &[Axis::A],
            MotorMap::B => &[Axis::B],
            MotorMap::C => &[Axis::C],
            MotorMap::CoreXyA | MotorMap::CoreXyB => &[Axis::X, Axis::Y],
        }
    }
}

/// Motor configuration from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MotorConfig {
    /// Axis mapping.
    pub axis: MotorMap,

    /// Full-step angle in degrees (1.8 for 200-step motors).
    #[serde(rename = "step_angle_deg", default = "default_step_angle")]
    pub step_angle: f32,

    /// Linear travel per motor revolution in mm.
    #[serde(rename = "travel_per_rev_mm")]
    pub travel_per_rev: f32,

    /// Microstep setting (1, 2, 4, 8, 16, 32, etc.).
    pub microsteps: Microsteps,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,
}

fn default_step_angle() -> f32 {
    1.8
}

impl MotorConfig {
    /// Steps per millimetre of travel.
    pub fn steps_per_mm(&self) -> f32 {
        (360.0 / self.step_angle) * self.microsteps.value() as f32 / self.travel_per_rev
    }
}
