//! Spindle and coolant configuration from TOML.

use serde::Deserialize;

/// Spindle toolhead settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SpindleConfig {
    /// Stop the spindle while a feedhold is held.
    #[serde(default = "default_true")]
    pub pause_on_hold: bool,

    /// Seconds to wait after restarting before motion may resume.
    #[serde(rename = "spinup_delay_sec", default)]
    pub spinup_delay: f32,

    /// Speed mapped to the lowest PWM duty.
    #[serde(rename = "speed_min_rpm", default)]
    pub speed_min: f32,

    /// Speed mapped to full PWM duty.
    #[serde(rename = "speed_max_rpm", default = "default_speed_max")]
    pub speed_max: f32,

    /// Enable pin is active high.
    #[serde(default = "default_true")]
    pub enable_active_high: bool,

    /// Direction pin level for clockwise rotation.
    #[serde(default)]
    pub cw_direction_high: bool,

    /// Time to ramp between override factors.
    #[serde(rename = "override_ramp_sec", default = "default_override_ramp")]
    pub override_ramp: f32,
}

impl Default for SpindleConfig {
    fn default() -> Self {
        Self {
            pause_on_hold: true,
            spinup_delay: 0.0,
            speed_min: 0.0,
            speed_max: default_speed_max(),
            enable_active_high: true,
            cw_direction_high: false,
            override_ramp: default_override_ramp(),
        }
    }
}

/// Coolant settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CoolantConfig {
    /// Turn coolant off while a feedhold is held.
    #[serde(default = "default_true")]
    pub pause_on_hold: bool,
}

impl Default for CoolantConfig {
    fn default() -> Self {
        Self { pause_on_hold: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_speed_max() -> f32 {
    24_000.0
}

fn default_override_ramp() -> f32 {
    0.5
}
