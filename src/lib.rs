//! # stepper-planner
//!
//! Jerk-limited lookahead motion planning and DDA step generation for
//! multi-axis machines, with embedded-hal 1.0 outputs.
//!
//! ## Features
//!
//! - **Lookahead planning**: backward/forward velocity passes over a ring of blocks
//! - **S-curve profiles**: acceleration and jerk limits projected onto each move
//! - **Junction deviation cornering**: corner speed from a cornering tolerance
//! - **Lock-free tick context**: segments handed over an SPSC queue, state published through atomics
//! - **Synchronized commands**: spindle and coolant actions fire in order with motion
//! - **Feedhold/resume**: stop along the path and continue with no position error
//! - **no_std compatible**: the core works without the standard library or an allocator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_planner::{MachineConstraints, MachineState, MoveRequest, Planner, SegmentQueue, StepGenerator};
//!
//! static STATE: MachineState = MachineState::new();
//!
//! let config = stepper_planner::load_config("machine.toml")?;
//! let constraints = MachineConstraints::from_config(&config)?;
//!
//! let mut queue = SegmentQueue::new();
//! let (producer, consumer) = queue.split();
//! let mut planner = Planner::motion_only(constraints, producer, &STATE);
//! let mut generator = StepGenerator::new(consumer, &STATE);
//!
//! planner.enqueue(MoveRequest::feed([10.0, 5.0, 0.0, 0.0, 0.0, 0.0], 1200.0))?;
//!
//! // Planning loop
//! planner.poll(0.001)?;
//!
//! // Timer interrupt
//! generator.tick(&mut pins)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Enables defmt formatting for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

/// Number of Cartesian axes (X Y Z A B C).
pub const AXES: usize = 6;

/// Maximum number of motors.
pub const MOTORS: usize = 6;

/// Planner buffer capacity in blocks.
pub const PLANNER_BUFFER_LEN: usize = 32;

/// Segment queue length (one slot is always kept free).
pub const SEGMENT_QUEUE_LEN: usize = 4;

/// Synchronized command queue capacity.
pub const COMMAND_QUEUE_LEN: usize = 16;

// Core modules
pub mod command;
pub mod config;
pub mod error;
pub mod hold;
pub mod kinematics;
pub mod planner;
pub mod runtime;
pub mod stepper;

// Re-exports for ergonomic API
pub use command::{
    Coolant, CoolantState, NullCoolant, NullToolhead, PinCoolant, PinSpindle, SpindleDirection,
    SyncCommand, Toolhead, ToolheadState,
};
pub use config::{validate_config, Axis, MachineConfig, MachineConstraints};
pub use error::{Error, FaultReason, InvalidMove, PlanError, Result};
pub use hold::HoldState;
pub use kinematics::{Kinematics, MachineKinematics};
pub use planner::{BlockHandle, MotionPhase, MoveBlock, MoveKind, MoveRequest, Planner};
pub use runtime::{Segment, SegmentQueue};
pub use stepper::{MachineState, MotorPins, PinBank, Snapshot, StepGenerator, StepOutput, TickStatus};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Microsteps, Millimeters, MmPerMin, MmPerSecCubed, MmPerSecSquared};
