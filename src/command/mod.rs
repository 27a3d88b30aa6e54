//! Synchronized commands and the devices they drive.
//!
//! A command is tagged with the sequence number of a command marker block
//! in the planner buffer. It fires when the runtime reaches that marker,
//! after every earlier segment has been stepped out and before any later
//! motion is sliced.

mod coolant;
mod toolhead;

pub use coolant::{Coolant, CoolantState, NullCoolant, PinCoolant};
pub use toolhead::{NullToolhead, PinSpindle, SpindleDirection, Toolhead, ToolheadState};

use heapless::Deque;

use crate::error::PlanError;
use crate::COMMAND_QUEUE_LEN;

/// A non-motion action ordered with motion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncCommand {
    /// Drive the toolhead to a speed and direction.
    Engage(ToolheadState),
    /// Turn the toolhead off.
    SpindleStop,
    /// Set the coolant valves.
    Coolant(CoolantState),
}

impl SyncCommand {
    /// Run the command against the devices.
    pub fn execute<T: Toolhead, C: Coolant>(
        &self,
        toolhead: &mut T,
        coolant: &mut C,
    ) -> Result<(), crate::error::MotorError> {
        match self {
            SyncCommand::Engage(state) => toolhead.engage(state),
            SyncCommand::SpindleStop => toolhead.stop(),
            SyncCommand::Coolant(state) => coolant.apply(*state),
        }
    }
}

/// FIFO of commands tagged with their marker.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: Deque<(u32, SyncCommand), COMMAND_QUEUE_LEN>,
}

impl CommandQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    /// Number of pending commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no command is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another command would be refused.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Queue `command` to fire at `marker`. Markers must not decrease.
    pub fn push(&mut self, marker: u32, command: SyncCommand) -> Result<(), PlanError> {
        self.entries
            .push_back((marker, command))
            .map_err(|_| PlanError::CommandQueueFull)
    }

    /// Next command due once the runtime has reached `marker`.
    pub fn pop_due(&mut self, marker: u32) -> Option<SyncCommand> {
        let (at, _) = self.entries.front()?;
        // Wrapping order: `at` is due if it is not after `marker`
        if (marker.wrapping_sub(*at) as i32) < 0 {
            return None;
        }
        self.entries.pop_front().map(|(_, command)| command)
    }

    /// Drop every command without running it.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
