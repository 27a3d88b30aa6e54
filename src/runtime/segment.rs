//! Segments handed from the runtime to the step generator.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::planner::MotionPhase;
use crate::{MOTORS, SEGMENT_QUEUE_LEN};

/// A short slice of motion replayed by the step generator.
///
/// Steps are distributed evenly over `ticks` generator ticks, so the
/// segment runs at its mean velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// Generator ticks spanned by the segment (at least 1).
    pub ticks: u32,
    /// Signed step count per motor.
    pub steps: [i32; MOTORS],
    /// Path velocity at the start of the segment in mm/s.
    pub velocity: f32,
    /// Path acceleration over the segment in mm/s².
    pub acceleration: f32,
    /// Profile phase the segment belongs to.
    pub phase: MotionPhase,
}

impl Segment {
    /// A segment that only lets time pass.
    pub fn idle(ticks: u32, phase: MotionPhase) -> Self {
        Self {
            ticks: ticks.max(1),
            steps: [0; MOTORS],
            velocity: 0.0,
            acceleration: 0.0,
            phase,
        }
    }

    /// Largest per-motor step count.
    pub fn max_steps(&self) -> u32 {
        self.steps.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
    }
}

/// Lock-free single-producer/single-consumer segment handoff.
pub type SegmentQueue = Queue<Segment, SEGMENT_QUEUE_LEN>;

/// Planning side of the handoff.
pub type SegmentProducer<'a> = Producer<'a, Segment, SEGMENT_QUEUE_LEN>;

/// Tick side of the handoff.
pub type SegmentConsumer<'a> = Consumer<'a, Segment, SEGMENT_QUEUE_LEN>;
