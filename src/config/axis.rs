//! Cartesian axis configuration from TOML.

use serde::Deserialize;

use super::limits::SoftLimits;
use super::units::{MmPerMin, MmPerSecCubed, MmPerSecSquared};

/// Machine axis identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// Linear X
    X = 0,
    /// Linear Y
    Y = 1,
    /// Linear Z
    Z = 2,
    /// Rotary or auxiliary A
    A = 3,
    /// Rotary or auxiliary B
    B = 4,
    /// Rotary or auxiliary C
    C = 5,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; crate::AXES] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C];

    /// Index into per-axis arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up an axis by its lowercase settings name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            "a" => Some(Axis::A),
            "b" => Some(Axis::B),
            "c" => Some(Axis::C),
            _ => None,
        }
    }

    /// Lowercase settings name.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::A => "a",
            Axis::B => "b",
            Axis::C => "c",
        }
    }
}

/// Kinematic limits for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AxisConfig {
    /// Traverse (rapid) velocity ceiling.
    #[serde(rename = "max_velocity_mm_per_min")]
    pub max_velocity: MmPerMin,

    /// Feed velocity ceiling. Defaults to the traverse ceiling.
    #[serde(default, rename = "max_feedrate_mm_per_min")]
    pub max_feedrate: Option<MmPerMin>,

    /// Maximum acceleration.
    #[serde(rename = "max_acceleration_mm_per_sec2")]
    pub max_acceleration: MmPerSecSquared,

    /// Maximum jerk.
    #[serde(rename = "max_jerk_mm_per_sec3")]
    pub max_jerk: MmPerSecCubed,

    /// Optional soft limits.
    #[serde(default)]
    pub limits: Option<SoftLimits>,
}

impl AxisConfig {
    /// Feed ceiling, falling back to the traverse ceiling.
    pub fn feedrate(&self) -> MmPerMin {
        self.max_feedrate.unwrap_or(self.max_velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_names_round_trip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_name(axis.name()), Some(axis));
        }
        assert_eq!(Axis::from_name("w"), None);
    }

    #[test]
    fn test_feedrate_defaults_to_velocity() {
        let axis = AxisConfig {
            max_velocity: MmPerMin(3000.0),
            max_feedrate: None,
            max_acceleration: MmPerSecSquared(500.0),
            max_jerk: MmPerSecCubed(5000.0),
            limits: None,
        };
        assert_eq!(axis.feedrate(), MmPerMin(3000.0));
    }
}
