//! Soft limit configuration and types.

use serde::Deserialize;

use super::units::Millimeters;

/// What happens to a target outside the travel range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Refuse the move.
    #[default]
    Reject,
    /// Move to the nearest end of travel instead.
    Clamp,
}

/// Per-axis travel range in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SoftLimits {
    /// Lower end of travel.
    #[serde(rename = "min_mm")]
    pub min: Millimeters,

    /// Upper end of travel.
    #[serde(rename = "max_mm")]
    pub max: Millimeters,

    /// Out-of-range handling.
    #[serde(default)]
    pub policy: LimitPolicy,
}

impl SoftLimits {
    /// Travel range with the given policy.
    pub fn new(min: Millimeters, max: Millimeters, policy: LimitPolicy) -> Self {
        Self { min, max, policy }
    }

    /// Whether the range is non-empty.
    pub fn is_valid(&self) -> bool {
        self.min.0 < self.max.0
    }

    /// The admitted target, or `None` if the move must be refused.
    pub fn apply(&self, target: f32) -> Option<f32> {
        let (min, max) = (self.min.0, self.max.0);
        if (min..=max).contains(&target) {
            return Some(target);
        }
        match self.policy {
            LimitPolicy::Reject => None,
            LimitPolicy::Clamp => Some(target.clamp(min, max)),
        }
    }
}
