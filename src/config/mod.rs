//! Configuration module for stepper-planner.
//!
//! Provides types for loading and validating machine settings from TOML
//! files (with `std` feature) or pre-parsed data, and the derived
//! constraints the planner consumes.

mod axis;
mod constraints;
mod limits;
mod machine;
mod motor;
mod spindle;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::{Axis, AxisConfig};
pub use constraints::{AxisConstraints, DirectionLimits, MachineConstraints, MotorConstraints};
pub use limits::{LimitPolicy, SoftLimits};
pub use machine::{KinematicsKind, MachineConfig, PlannerConfig};
pub use motor::{MotorConfig, MotorMap};
pub use spindle::{CoolantConfig, SpindleConfig};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Microsteps, Millimeters, MmPerMin, MmPerSecCubed, MmPerSecSquared};
