//! Tick-driven step generator.
//!
//! A Bresenham-style digital differential analyzer: for a segment of `T`
//! ticks and `n` steps on a motor, an accumulator gains `n` every tick and
//! a step is emitted each time it reaches `T`. With the accumulator primed
//! at `T / 2`, exactly `n` steps come out, evenly spaced, and the error is
//! never more than half a step. Integer-only so it is cheap in an ISR.

use crate::error::MotorError;
use crate::planner::MotionPhase;
use crate::runtime::{Segment, SegmentConsumer};
use crate::MOTORS;

use super::output::{Direction, StepOutput};
use super::state::MachineState;

/// Outcome of one generator tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickStatus {
    /// No segment to execute.
    Idle,
    /// A segment is executing.
    Busy,
    /// Abort requested; outputs are held still.
    Aborted,
}

#[derive(Debug, Clone, Copy)]
struct ActiveSegment {
    steps: [u32; MOTORS],
    direction: [i32; MOTORS],
    accumulator: [u32; MOTORS],
    ticks: u32,
    remaining: u32,
}

impl ActiveSegment {
    fn new(segment: &Segment) -> Self {
        let mut steps = [0u32; MOTORS];
        let mut direction = [0i32; MOTORS];
        for m in 0..MOTORS {
            steps[m] = segment.steps[m].unsigned_abs();
            direction[m] = Direction::from_steps(segment.steps[m]).sign();
        }
        // More steps than ticks cannot be emitted one per tick
        let ticks = segment.ticks.max(segment.max_steps()).max(1);
        Self {
            steps,
            direction,
            accumulator: [ticks / 2; MOTORS],
            ticks,
            remaining: ticks,
        }
    }
}

/// Consumes segments and drives step/direction outputs.
///
/// Call [`StepGenerator::tick`] from a fixed-period timer interrupt.
pub struct StepGenerator<'a> {
    segments: SegmentConsumer<'a>,
    state: &'a MachineState,
    active: Option<ActiveSegment>,
    raised: [bool; MOTORS],
    idle_published: bool,
}

impl<'a> StepGenerator<'a> {
    /// Create a generator reading from the tick side of the segment queue.
    pub fn new(segments: SegmentConsumer<'a>, state: &'a MachineState) -> Self {
        Self {
            segments,
            state,
            active: None,
            raised: [false; MOTORS],
            idle_published: false,
        }
    }

    /// Whether a segment is loaded.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Advance one tick.
    ///
    /// Step lines raised on the previous tick are lowered first, so every
    /// pulse lasts one tick period.
    pub fn tick<O: StepOutput>(&mut self, out: &mut O) -> Result<TickStatus, MotorError> {
        for (m, raised) in self.raised.iter_mut().enumerate() {
            if *raised {
                out.step_low(m)?;
                *raised = false;
            }
        }

        if self.state.abort_requested() {
            if !self.state.abort_acknowledged() {
                self.hard_stop();
            }
            return Ok(TickStatus::Aborted);
        }

        if self.active.is_none() && !self.load_next(out)? {
            if !self.idle_published {
                self.state.publish_segment(0.0, MotionPhase::Idle);
                self.idle_published = true;
            }
            return Ok(TickStatus::Idle);
        }

        let Some(active) = self.active.as_mut() else {
            return Ok(TickStatus::Idle);
        };

        let mut deltas = [0i32; MOTORS];
        let mut stepped = false;
        for m in 0..MOTORS {
            if active.steps[m] == 0 {
                continue;
            }
            active.accumulator[m] += active.steps[m];
            if active.accumulator[m] >= active.ticks {
                active.accumulator[m] -= active.ticks;
                out.step_high(m)?;
                self.raised[m] = true;
                deltas[m] = active.direction[m];
                stepped = true;
            }
        }
        if stepped {
            self.state.add_steps(&deltas);
        }

        active.remaining -= 1;
        if active.remaining == 0 {
            self.active = None;
            self.state.finish_segments(1);
            // Prefetch so direction lines settle a tick before the first step
            self.load_next(out)?;
        }

        Ok(TickStatus::Busy)
    }

    fn load_next<O: StepOutput>(&mut self, out: &mut O) -> Result<bool, MotorError> {
        let Some(segment) = self.segments.dequeue() else {
            return Ok(false);
        };

        for (m, &steps) in segment.steps.iter().enumerate() {
            if steps != 0 {
                out.set_direction(m, Direction::from_steps(steps))?;
            }
        }
        self.active = Some(ActiveSegment::new(&segment));
        self.state.publish_segment(segment.velocity, segment.phase);
        self.idle_published = false;
        Ok(true)
    }

    /// Drop the executing segment and everything queued, without deceleration.
    fn hard_stop(&mut self) {
        let mut dropped = u32::from(self.active.take().is_some());
        while self.segments.dequeue().is_some() {
            dropped += 1;
        }
        self.state.finish_segments(dropped);
        self.state.publish_segment(0.0, MotionPhase::Idle);
        self.idle_published = true;
        self.state.acknowledge_abort();
    }
}
