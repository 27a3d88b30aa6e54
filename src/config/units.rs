//! Unit types for physical quantities.
//!
//! Configuration uses the units machinists read off a settings sheet
//! (mm/min for rates). The constraint layer converts everything to mm and
//! seconds before it reaches the planner.

use serde::Deserialize;

use crate::error::ConfigError;

macro_rules! linear_unit {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f32);
    };
}

linear_unit!(
    /// Linear position or length in millimetres.
    Millimeters
);
linear_unit!(
    /// Linear rate in millimetres per minute (G-code feed rate units).
    MmPerMin
);
linear_unit!(
    /// Linear acceleration in mm/s².
    MmPerSecSquared
);
linear_unit!(
    /// Linear jerk in mm/s³.
    MmPerSecCubed
);

impl MmPerMin {
    /// Convert to millimetres per second.
    #[inline]
    pub fn per_sec(self) -> f32 {
        self.0 / 60.0
    }
}

/// Microstep divisor (1, 2, 4, 8, 16, 32, 64, 128, 256).
///
/// Validated at construction to be a power of 2 within the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Microsteps(u16);

impl Microsteps {
    /// Full step (no microstepping).
    pub const FULL: Self = Self(1);
    /// Eighth step.
    pub const EIGHTH: Self = Self(8);

    const VALID_VALUES: [u16; 9] = [1, 2, 4, 8, 16, 32, 64, 128, 256];

    /// Create a microstep divisor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMicrosteps` if the value is not a valid power of 2.
    pub fn new(value: u16) -> Result<Self, ConfigError> {
        if Self::VALID_VALUES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidMicrosteps(value))
        }
    }

    /// Raw divisor.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl Default for Microsteps {
    fn default() -> Self {
        Self::FULL
    }
}

impl<'de> Deserialize<'de> for Microsteps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u16::deserialize(deserializer)?;
        Microsteps::new(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}
