//! Machine runtime state shared between the planning and tick contexts.
//!
//! Every field has exactly one writer and uses plain atomic loads/stores,
//! so it works on cores without compare-and-swap. Motor positions are
//! written by the step generator under an odd/even sequence counter;
//! readers retry while a write is in progress and never block the writer.

use core::sync::atomic::{fence, AtomicBool, AtomicI32, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::hold::HoldState;
use crate::kinematics::Kinematics;
use crate::planner::MotionPhase;
use crate::{AXES, MOTORS};

const SNAPSHOT_RETRIES: usize = 8;

/// Process-wide machine state.
#[derive(Debug)]
pub struct MachineState {
    position_seq: AtomicU32,
    position: [AtomicI32; MOTORS],
    velocity: AtomicU32,
    phase: AtomicU8,
    segments_done: AtomicU32,
    abort_request: AtomicBool,
    abort_ack: AtomicBool,
    hold_state: AtomicU8,
    buffer_fill: AtomicUsize,
}

/// Consistent copy of the machine state for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    /// Absolute motor positions in steps.
    pub position: [i32; MOTORS],
    /// Path velocity of the executing segment in mm/s.
    pub velocity: f32,
    /// Profile phase of the executing segment.
    pub phase: MotionPhase,
    /// Blocks held by the planner buffer.
    pub buffer_fill: usize,
    /// Feedhold controller state.
    pub hold_state: HoldState,
    /// Segments completed by the step generator.
    pub segments_done: u32,
}

impl Snapshot {
    /// Axis position in mm through the machine kinematics.
    pub fn axis_position<K: Kinematics>(&self, kinematics: &K) -> [f32; AXES] {
        kinematics.motors_to_axes(&self.position)
    }
}

impl MachineState {
    /// Initial state: at the origin, not moving.
    #[allow(clippy::declare_interior_mutable_const)]
    pub const fn new() -> Self {
        const ZERO: AtomicI32 = AtomicI32::new(0);
        Self {
            position_seq: AtomicU32::new(0),
            position: [ZERO; MOTORS],
            velocity: AtomicU32::new(0),
            phase: AtomicU8::new(MotionPhase::Idle as u8),
            segments_done: AtomicU32::new(0),
            abort_request: AtomicBool::new(false),
            abort_ack: AtomicBool::new(false),
            hold_state: AtomicU8::new(HoldState::Running as u8),
            buffer_fill: AtomicUsize::new(0),
        }
    }

    // Tick-context writers

    /// Apply one step on each motor flagged in `deltas`.
    pub(crate) fn add_steps(&self, deltas: &[i32; MOTORS]) {
        let seq = self.position_seq.load(Ordering::Relaxed);
        self.position_seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (pos, d) in self.position.iter().zip(deltas.iter()) {
            if *d != 0 {
                let p = pos.load(Ordering::Relaxed);
                pos.store(p.wrapping_add(*d), Ordering::Relaxed);
            }
        }
        self.position_seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    pub(crate) fn publish_segment(&self, velocity: f32, phase: MotionPhase) {
        self.velocity.store(velocity.to_bits(), Ordering::Relaxed);
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub(crate) fn finish_segments(&self, count: u32) {
        let done = self.segments_done.load(Ordering::Relaxed);
        self.segments_done.store(done.wrapping_add(count), Ordering::Release);
    }

    pub(crate) fn acknowledge_abort(&self) {
        self.abort_ack.store(true, Ordering::Release);
    }

    // Planning-context writers

    pub(crate) fn request_abort(&self) {
        self.abort_request.store(true, Ordering::Release);
    }

    pub(crate) fn clear_abort(&self) {
        self.abort_ack.store(false, Ordering::Relaxed);
        self.abort_request.store(false, Ordering::Release);
    }

    pub(crate) fn publish_hold_state(&self, state: HoldState) {
        self.hold_state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn publish_buffer_fill(&self, fill: usize) {
        self.buffer_fill.store(fill, Ordering::Relaxed);
    }

    /// Overwrite motor positions. Only valid while the generator is idle.
    pub(crate) fn set_position(&self, steps: &[i32; MOTORS]) {
        let seq = self.position_seq.load(Ordering::Relaxed);
        self.position_seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (pos, s) in self.position.iter().zip(steps.iter()) {
            pos.store(*s, Ordering::Relaxed);
        }
        self.position_seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    // Readers

    /// Whether an abort has been requested and not yet cleared.
    #[inline]
    pub fn abort_requested(&self) -> bool {
        self.abort_request.load(Ordering::Acquire)
    }

    /// Whether the step generator has stopped and dropped its segments.
    #[inline]
    pub fn abort_acknowledged(&self) -> bool {
        self.abort_ack.load(Ordering::Acquire)
    }

    /// Segments completed since start-up (wrapping).
    #[inline]
    pub fn segments_done(&self) -> u32 {
        self.segments_done.load(Ordering::Acquire)
    }

    /// Feedhold controller state.
    #[inline]
    pub fn hold_state(&self) -> HoldState {
        HoldState::from_u8(self.hold_state.load(Ordering::Acquire))
    }

    /// Velocity of the executing segment.
    #[inline]
    pub fn velocity(&self) -> f32 {
        f32::from_bits(self.velocity.load(Ordering::Relaxed))
    }

    /// Motor positions, or `None` if every read raced with a write.
    pub fn position(&self) -> Option<[i32; MOTORS]> {
        for _ in 0..SNAPSHOT_RETRIES {
            let before = self.position_seq.load(Ordering::Acquire);
            if before % 2 == 1 {
                continue;
            }
            let mut out = [0i32; MOTORS];
            for (o, pos) in out.iter_mut().zip(self.position.iter()) {
                *o = pos.load(Ordering::Relaxed);
            }
            fence(Ordering::Acquire);
            if self.position_seq.load(Ordering::Relaxed) == before {
                return Some(out);
            }
        }
        None
    }

    /// Read-only copy of the machine state.
    ///
    /// Returns `None` only if the position was being written on every
    /// retry, which the caller can treat as "try again next report".
    pub fn snapshot(&self) -> Option<Snapshot> {
        let position = self.position()?;
        Some(Snapshot {
            position,
            velocity: self.velocity(),
            phase: MotionPhase::from_u8(self.phase.load(Ordering::Relaxed)),
            buffer_fill: self.buffer_fill.load(Ordering::Relaxed),
            hold_state: self.hold_state(),
            segments_done: self.segments_done(),
        })
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}
