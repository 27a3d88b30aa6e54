//! Machine configuration - root configuration structure.

use heapless::{FnvIndexMap, String, Vec};
use serde::Deserialize;

use super::axis::{Axis, AxisConfig};
use super::motor::MotorConfig;
use super::spindle::{CoolantConfig, SpindleConfig};
use crate::MOTORS;

/// Motor/axis coupling selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KinematicsKind {
    /// Each motor drives one axis (several motors may share an axis).
    #[default]
    Cartesian,
    /// Two belt motors jointly drive X and Y.
    CoreXy,
}

/// Planner and timing settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlannerConfig {
    /// Junction deviation used for cornering speed.
    #[serde(rename = "cornering_tolerance_mm", default = "default_cornering_tolerance")]
    pub cornering_tolerance: f32,

    /// Nominal segment duration in microseconds.
    #[serde(default = "default_segment_time_us")]
    pub segment_time_us: u32,

    /// Pulse generator tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Motor/axis coupling.
    #[serde(default)]
    pub kinematics: KinematicsKind,

    /// Moves shorter than this are rejected.
    #[serde(rename = "min_block_length_mm", default = "default_min_block_length")]
    pub min_block_length: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cornering_tolerance: default_cornering_tolerance(),
            segment_time_us: default_segment_time_us(),
            tick_hz: default_tick_hz(),
            kinematics: KinematicsKind::Cartesian,
            min_block_length: default_min_block_length(),
        }
    }
}

fn default_cornering_tolerance() -> f32 {
    0.01
}

fn default_segment_time_us() -> u32 {
    1000
}

fn default_tick_hz() -> u32 {
    50_000
}

fn default_min_block_length() -> f32 {
    0.0001
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MachineConfig {
    /// Planner and timing settings.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Per-axis limits keyed by axis name (x, y, z, a, b, c).
    pub axes: FnvIndexMap<String<8>, AxisConfig, 8>,

    /// Motors in output order.
    pub motors: Vec<MotorConfig, MOTORS>,

    /// Spindle settings.
    #[serde(default)]
    pub spindle: SpindleConfig,

    /// Coolant settings.
    #[serde(default)]
    pub coolant: CoolantConfig,
}

impl MachineConfig {
    /// Get an axis configuration.
    pub fn axis(&self, axis: Axis) -> Option<&AxisConfig> {
        self.axes
            .iter()
            .find(|(k, _)| k.as_str() == axis.name())
            .map(|(_, v)| v)
    }

    /// List configured axis names.
    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(|s| s.as_str())
    }

    /// Insert or replace an axis configuration.
    pub fn set_axis(&mut self, axis: Axis, config: AxisConfig) -> Result<(), AxisConfig> {
        let key = String::try_from(axis.name()).map_err(|_| config)?;
        self.axes.insert(key, config).map(|_| ()).map_err(|(_, v)| v)
    }
}
