//! Feedhold/resume state machine.
//!
//! ```text
//! Running → HoldRequested → Decelerating → Held → ResumeRequested → Accelerating → Running
//! ```
//!
//! `Aborted` is entered from any state by a hard fault and left only by
//! clearing the fault. The controller only tracks state; the runtime
//! performs the deceleration and the planner drives the transitions.

use log::info;

/// Feedhold controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HoldState {
    /// Normal execution.
    #[default]
    Running = 0,
    /// Hold requested; the runtime has not started the stop yet.
    HoldRequested = 1,
    /// Stopping along the path.
    Decelerating = 2,
    /// Stopped with the remaining program intact.
    Held = 3,
    /// Resume requested; waiting for pause-sensitive devices.
    ResumeRequested = 4,
    /// Re-accelerating into the remaining program.
    Accelerating = 5,
    /// Hard fault latched; the queue was dropped.
    Aborted = 6,
}

impl HoldState {
    /// Decode a value published through an atomic.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::HoldRequested,
            2 => Self::Decelerating,
            3 => Self::Held,
            4 => Self::ResumeRequested,
            5 => Self::Accelerating,
            6 => Self::Aborted,
            _ => Self::Running,
        }
    }

    /// Whether new blocks may be admitted.
    #[inline]
    pub fn admits_blocks(self) -> bool {
        matches!(self, Self::Running | Self::Accelerating)
    }

    /// Whether a stop is in progress or complete.
    #[inline]
    pub fn is_holding(self) -> bool {
        matches!(
            self,
            Self::HoldRequested | Self::Decelerating | Self::Held | Self::ResumeRequested
        )
    }
}

/// Tracks feedhold state and a resume requested before the stop finished.
#[derive(Debug, Clone, Default)]
pub struct FeedholdController {
    state: HoldState,
    resume_pending: bool,
}

impl FeedholdController {
    /// Create a controller in `Running`.
    pub const fn new() -> Self {
        Self {
            state: HoldState::Running,
            resume_pending: false,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> HoldState {
        self.state
    }

    /// Ask for a stop. Returns false (no-op) unless running.
    pub fn request_hold(&mut self) -> bool {
        match self.state {
            HoldState::Running | HoldState::Accelerating => {
                self.resume_pending = false;
                self.set(HoldState::HoldRequested);
                true
            }
            _ => false,
        }
    }

    /// Ask to continue. Returns false (no-op) unless a hold is active.
    ///
    /// A resume arriving while still stopping is remembered and applied as
    /// soon as the machine is held.
    pub fn request_resume(&mut self) -> bool {
        match self.state {
            HoldState::Held => {
                self.set(HoldState::ResumeRequested);
                true
            }
            HoldState::HoldRequested | HoldState::Decelerating => {
                self.resume_pending = true;
                true
            }
            _ => false,
        }
    }

    /// Whether a resume is waiting for the stop to finish.
    #[inline]
    pub fn resume_pending(&self) -> bool {
        self.resume_pending
    }

    /// The runtime started decelerating.
    pub fn decelerating(&mut self) {
        if self.state == HoldState::HoldRequested {
            self.set(HoldState::Decelerating);
        }
    }

    /// Velocity reached zero.
    pub fn held(&mut self) {
        if matches!(self.state, HoldState::HoldRequested | HoldState::Decelerating) {
            self.set(HoldState::Held);
            if core::mem::take(&mut self.resume_pending) {
                self.set(HoldState::ResumeRequested);
            }
        }
    }

    /// Pause-sensitive devices are ready; motion restarts.
    pub fn accelerating(&mut self) {
        if self.state == HoldState::ResumeRequested {
            self.set(HoldState::Accelerating);
        }
    }

    /// Re-acceleration finished.
    pub fn running(&mut self) {
        if self.state == HoldState::Accelerating {
            self.set(HoldState::Running);
        }
    }

    /// Latch a hard fault.
    pub fn abort(&mut self) {
        self.resume_pending = false;
        if self.state != HoldState::Aborted {
            self.set(HoldState::Aborted);
        }
    }

    /// Clear a latched fault.
    pub fn clear(&mut self) {
        if self.state == HoldState::Aborted {
            self.set(HoldState::Running);
        }
    }

    fn set(&mut self, next: HoldState) {
        info!("feedhold: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
