//! Error types for stepper-planner.
//!
//! Provides unified error handling across configuration, planning, and step output.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-planner operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Move admission or planning error
    Plan(PlanError),
    /// Step/direction or device pin error
    Motor(MotorError),
}

impl Error {
    /// Whether the caller should retry the same request later.
    ///
    /// `BufferFull`, `Held`, `Busy` and `CommandQueueFull` clear on their own as
    /// the machine drains. Everything else means the request itself is wrong
    /// or the job has faulted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Plan(
                PlanError::BufferFull
                    | PlanError::Held
                    | PlanError::Busy
                    | PlanError::CommandQueueFull
            )
        )
    }
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Invalid microstep value (must be power of 2: 1, 2, 4, 8, 16, 32, 64, 128, 256)
    InvalidMicrosteps(u16),
    /// Axis name is not one of x, y, z, a, b, c
    UnknownAxis(heapless::String<8>),
    /// A motor maps to an axis that has no configuration
    UnconfiguredAxis(heapless::String<8>),
    /// Invalid max velocity (must be > 0)
    InvalidMaxVelocity(f32),
    /// Invalid max acceleration (must be > 0)
    InvalidMaxAcceleration(f32),
    /// Invalid max jerk (must be > 0)
    InvalidMaxJerk(f32),
    /// Invalid step angle or travel per revolution (must be > 0)
    InvalidMotorGeometry {
        /// Step angle in degrees
        step_angle: f32,
        /// Travel per revolution in mm
        travel_per_rev: f32,
    },
    /// Invalid soft limits (min must be < max)
    InvalidSoftLimits {
        /// Minimum limit value
        min: f32,
        /// Maximum limit value
        max: f32,
    },
    /// Invalid cornering tolerance (must be > 0)
    InvalidCorneringTolerance(f32),
    /// Segment time must span at least two generator ticks
    InvalidSegmentTime {
        /// Segment time in microseconds
        segment_time_us: u32,
        /// Generator tick rate in Hz
        tick_hz: u32,
    },
    /// An axis at full speed would need more than one step per tick on some motor
    StepRateTooHigh {
        /// Motor index
        motor: usize,
        /// Required steps per tick
        steps_per_tick: f32,
    },
    /// CoreXY kinematics need one A and one B motor with equal steps per mm
    InvalidCoreXy,
    /// Spindle speed range is empty or negative
    InvalidSpindleRange {
        /// Minimum speed
        min: f32,
        /// Maximum speed
        max: f32,
    },
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Reasons a move request is rejected outright.
///
/// Unlike [`PlanError::BufferFull`], retrying the same request will not help.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidMove {
    /// Target coordinate is NaN or infinite
    NonFiniteTarget,
    /// Feed rate is NaN or infinite
    NonFiniteFeedRate,
    /// Feed rate is zero or negative
    ZeroFeedRate,
    /// Move is shorter than the minimum block length
    TooShort {
        /// Requested length in mm
        length: f32,
        /// Minimum length in mm
        minimum: f32,
    },
    /// Move displaces an axis that is not configured
    AxisDisabled(usize),
    /// Target lies outside the axis soft limits
    SoftLimit {
        /// Axis index
        axis: usize,
        /// Requested target in mm
        target: f32,
        /// Lower limit in mm
        min: f32,
        /// Upper limit in mm
        max: f32,
    },
    /// Dwell time is negative or not finite
    InvalidDwell,
}

/// Planner admission and control errors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlanError {
    /// Planner buffer is at capacity; retry once execution drains a block
    BufferFull,
    /// Block admission is frozen by a feedhold
    Held,
    /// A hard fault is latched; call `clear_fault` before queuing
    Faulted,
    /// Operation requires motion to be idle
    Busy,
    /// Synchronized command queue is at capacity
    CommandQueueFull,
    /// Malformed move request
    InvalidMove(InvalidMove),
}

/// Step output and device pin errors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorError {
    /// Pin operation failed
    PinError,
    /// Motor index outside the configured range
    InvalidMotor(usize),
}

/// Cause of a hard stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultReason {
    /// Limit switch tripped
    LimitSwitch,
    /// External alarm input
    Alarm,
    /// Step driver or pin failure
    Driver,
    /// Operator abort
    Abort,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Plan(e) => write!(f, "Planner error: {}", e),
            Error::Motor(e) => write!(f, "Motor error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidMicrosteps(v) => {
                write!(f, "Invalid microsteps: {}. Valid values: 1, 2, 4, 8, 16, 32, 64, 128, 256", v)
            }
            ConfigError::UnknownAxis(name) => write!(f, "Unknown axis '{}'", name),
            ConfigError::UnconfiguredAxis(name) => {
                write!(f, "Motor mapped to unconfigured axis '{}'", name)
            }
            ConfigError::InvalidMaxVelocity(v) => write!(f, "Invalid max velocity: {}. Must be > 0", v),
            ConfigError::InvalidMaxAcceleration(v) => {
                write!(f, "Invalid max acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidMaxJerk(v) => write!(f, "Invalid max jerk: {}. Must be > 0", v),
            ConfigError::InvalidMotorGeometry { step_angle, travel_per_rev } => write!(
                f,
                "Invalid motor geometry: step angle {} deg, travel {} mm/rev",
                step_angle, travel_per_rev
            ),
            ConfigError::InvalidSoftLimits { min, max } => {
                write!(f, "Invalid soft limits: min ({}) must be < max ({})", min, max)
            }
            ConfigError::InvalidCorneringTolerance(v) => {
                write!(f, "Invalid cornering tolerance: {}. Must be > 0", v)
            }
            ConfigError::InvalidSegmentTime { segment_time_us, tick_hz } => write!(
                f,
                "Segment time {} us is shorter than two ticks at {} Hz",
                segment_time_us, tick_hz
            ),
            ConfigError::StepRateTooHigh { motor, steps_per_tick } => write!(
                f,
                "Motor {} needs {} steps per tick at max velocity (max 1)",
                motor, steps_per_tick
            ),
            ConfigError::InvalidCoreXy => {
                write!(f, "CoreXY needs one core_xy_a and one core_xy_b motor with equal steps/mm")
            }
            ConfigError::InvalidSpindleRange { min, max } => {
                write!(f, "Invalid spindle speed range [{}, {}]", min, max)
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for InvalidMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidMove::NonFiniteTarget => write!(f, "Target position is not finite"),
            InvalidMove::NonFiniteFeedRate => write!(f, "Feed rate is not finite"),
            InvalidMove::ZeroFeedRate => write!(f, "Feed rate must be > 0"),
            InvalidMove::TooShort { length, minimum } => {
                write!(f, "Move of {} mm is shorter than minimum {} mm", length, minimum)
            }
            InvalidMove::AxisDisabled(axis) => write!(f, "Axis {} is not configured", axis),
            InvalidMove::SoftLimit { axis, target, min, max } => write!(
                f,
                "Axis {} target {} exceeds soft limits [{}, {}]",
                axis, target, min, max
            ),
            InvalidMove::InvalidDwell => write!(f, "Dwell time must be finite and >= 0"),
        }
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::BufferFull => write!(f, "Planner buffer full"),
            PlanError::Held => write!(f, "Block admission frozen by feedhold"),
            PlanError::Faulted => write!(f, "Hard fault latched"),
            PlanError::Busy => write!(f, "Motion must be idle"),
            PlanError::CommandQueueFull => write!(f, "Command queue full"),
            PlanError::InvalidMove(e) => write!(f, "Invalid move: {}", e),
        }
    }
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::PinError => write!(f, "GPIO pin operation failed"),
            MotorError::InvalidMotor(m) => write!(f, "Motor {} is out of range", m),
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::LimitSwitch => write!(f, "limit switch"),
            FaultReason::Alarm => write!(f, "alarm"),
            FaultReason::Driver => write!(f, "driver fault"),
            FaultReason::Abort => write!(f, "abort"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<PlanError> for Error {
    fn from(e: PlanError) -> Self {
        Error::Plan(e)
    }
}

impl From<InvalidMove> for Error {
    fn from(e: InvalidMove) -> Self {
        Error::Plan(PlanError::InvalidMove(e))
    }
}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Error::Motor(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for PlanError {}

#[cfg(feature = "std")]
impl std::error::Error for InvalidMove {}

#[cfg(feature = "std")]
impl std::error::Error for MotorError {}
