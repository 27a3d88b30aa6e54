//! Tick-context step generation and shared machine state.
//!
//! [`StepGenerator::tick`] is the only code meant to run in a timer
//! interrupt. It reads segments from a lock-free SPSC queue and publishes
//! position and status through [`MachineState`] atomics.

mod dda;
mod output;
mod state;

pub use dda::{StepGenerator, TickStatus};
pub use output::{Direction, MotorPins, PinBank, StepOutput};
pub use state::{MachineState, Snapshot};
