//! Segment exec: slices the head block's profile into segments.
//!
//! The runtime walks the head of the planner buffer forward in time and
//! hands fixed-duration segments to the step generator through the SPSC
//! queue. Segment end points are converted to absolute motor steps, and
//! each segment carries the difference to the previous end point, so
//! rounding never accumulates and every block lands exactly on its target.
//!
//! At most [`MAX_IN_FLIGHT`] segments are ever handed over but not yet
//! stepped out, which bounds feedhold latency.

use libm::roundf;

use crate::config::MachineConstraints;
use crate::kinematics::Kinematics;
use crate::planner::{BlockKind, BlockState, MotionPhase, MoveBlock, PlannerBuffer, Profile};
use crate::stepper::MachineState;
use crate::{AXES, MOTORS};

use super::segment::{Segment, SegmentProducer};

/// Segments handed to the step generator and not yet completed.
pub const MAX_IN_FLIGHT: u32 = 2;

/// A remainder up to this many nominal segments is emitted as one.
const SPLIT_FACTOR: f32 = 1.5;
const DISTANCE_EPSILON: f32 = 1e-6;
const VELOCITY_EPSILON: f32 = 1e-3;

/// Result of one [`Runtime::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RuntimeEvent {
    /// Work was done; call again.
    Progress,
    /// The step generator must drain before more work can be done.
    Waiting,
    /// Nothing to execute.
    Idle,
    /// A command marker was reached and retired; fire its commands now.
    CommandsDue(u32),
    /// A hold stop was planned (or the machine was already at rest).
    HoldStarted,
    /// The hold stop has been fully stepped out.
    HoldComplete,
}

#[derive(Debug, Clone)]
struct MotionCursor {
    profile: Profile,
    elapsed: f32,
    distance: f32,
}

#[derive(Debug, Clone)]
enum Cursor {
    Motion(MotionCursor),
    Dwell { remaining: f32 },
}

#[derive(Debug, Clone)]
struct HoldRamp {
    profile: Profile<4>,
    elapsed: f32,
    /// Ramp distance at which the current block was entered, minus the
    /// distance already covered in it when the hold began.
    offset: f32,
}

#[derive(Debug, Clone)]
enum HoldMode {
    Off,
    Requested,
    Ramp(HoldRamp),
    Stopped { reported: bool },
}

/// Runtime segment exec.
pub struct Runtime<'a> {
    segments: SegmentProducer<'a>,
    state: &'a MachineState,
    segment_time: f32,
    tick_hz: f32,
    commanded: [i32; MOTORS],
    pushed: u32,
    cursor: Option<Cursor>,
    hold: HoldMode,
    phase: MotionPhase,
}

impl<'a> Runtime<'a> {
    /// Create a runtime feeding the planning side of the segment queue.
    pub fn new(
        segments: SegmentProducer<'a>,
        state: &'a MachineState,
        constraints: &MachineConstraints,
    ) -> Self {
        Self {
            segments,
            state,
            segment_time: constraints.segment_time,
            tick_hz: constraints.tick_hz as f32,
            commanded: state.position().unwrap_or([0; MOTORS]),
            pushed: state.segments_done(),
            cursor: None,
            hold: HoldMode::Off,
            phase: MotionPhase::Idle,
        }
    }

    /// Take new segment timing for subsequently sliced segments.
    pub fn set_timing(&mut self, constraints: &MachineConstraints) {
        self.segment_time = constraints.segment_time;
        self.tick_hz = constraints.tick_hz as f32;
    }

    /// Segments handed over and not yet completed.
    #[inline]
    pub fn in_flight(&self) -> u32 {
        self.pushed.wrapping_sub(self.state.segments_done())
    }

    /// Whether no block is being executed and every segment was stepped out.
    pub fn is_idle(&self) -> bool {
        self.cursor.is_none() && self.in_flight() == 0
    }

    /// Phase of the last sliced segment.
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Motor positions at the end of the last sliced segment.
    #[inline]
    pub fn commanded(&self) -> [i32; MOTORS] {
        self.commanded
    }

    /// Ask for a stop at the next segment boundary.
    pub fn request_hold(&mut self) {
        if matches!(self.hold, HoldMode::Off) {
            self.hold = HoldMode::Requested;
        }
    }

    /// Drop all execution state after an abort or a position reset.
    pub fn reset(&mut self, commanded: [i32; MOTORS]) {
        self.commanded = commanded;
        self.pushed = self.state.segments_done();
        self.cursor = None;
        self.hold = HoldMode::Off;
        self.phase = MotionPhase::Idle;
    }

    /// Leave a completed hold.
    ///
    /// A partially executed move becomes a queued block covering the
    /// remaining distance. Returns true when the buffer must be re-planned
    /// from rest.
    pub fn release_hold<const N: usize>(&mut self, buffer: &mut PlannerBuffer<N>) -> bool {
        self.hold = HoldMode::Off;
        self.phase = MotionPhase::Accelerating;

        match self.cursor.take() {
            Some(Cursor::Motion(cursor)) => {
                if let Some(block) = buffer.get_mut(0) {
                    let remaining = block.length - cursor.distance;
                    if remaining <= DISTANCE_EPSILON {
                        buffer.retire_head();
                    } else {
                        block.start = block.point_at(cursor.distance);
                        block.length = remaining;
                        block.state = BlockState::Queued;
                    }
                }
                true
            }
            Some(dwell) => {
                // Queued blocks already start from rest after a dwell
                self.cursor = Some(dwell);
                false
            }
            None => true,
        }
    }

    /// Produce at most one segment, or report why not.
    pub fn step<const N: usize, K: Kinematics>(
        &mut self,
        buffer: &mut PlannerBuffer<N>,
        kinematics: &K,
    ) -> RuntimeEvent {
        if let HoldMode::Stopped { reported } = &mut self.hold {
            if self.pushed.wrapping_sub(self.state.segments_done()) > 0 {
                return RuntimeEvent::Waiting;
            }
            if !*reported {
                *reported = true;
                self.phase = MotionPhase::Idle;
                return RuntimeEvent::HoldComplete;
            }
            return RuntimeEvent::Idle;
        }

        if self.in_flight() >= MAX_IN_FLIGHT || !self.segments.ready() {
            return RuntimeEvent::Waiting;
        }

        if matches!(self.hold, HoldMode::Requested) && self.begin_hold(buffer) {
            return RuntimeEvent::HoldStarted;
        }
        if matches!(self.hold, HoldMode::Ramp(_)) {
            return self.hold_segment(buffer, kinematics);
        }

        if self.cursor.is_none() {
            match buffer.head().map(|b| (b.seq, b.kind)) {
                None => {
                    self.phase = MotionPhase::Idle;
                    return RuntimeEvent::Idle;
                }
                Some((seq, BlockKind::Command)) => {
                    if self.in_flight() > 0 {
                        return RuntimeEvent::Waiting;
                    }
                    buffer.retire_head();
                    return RuntimeEvent::CommandsDue(seq);
                }
                Some(_) => self.activate_head(buffer),
            }
        }

        match self.cursor {
            Some(Cursor::Motion(_)) => self.motion_segment(buffer, kinematics),
            Some(Cursor::Dwell { .. }) => self.dwell_segment(buffer),
            None => RuntimeEvent::Idle,
        }
    }

    /// Start the head block if it is a move or dwell.
    fn activate_head<const N: usize>(&mut self, buffer: &mut PlannerBuffer<N>) {
        self.cursor = match buffer.get_mut(0) {
            Some(block) => match block.kind {
                BlockKind::Move(_) => {
                    block.state = BlockState::Running;
                    Some(Cursor::Motion(MotionCursor {
                        profile: block.profile(),
                        elapsed: 0.0,
                        distance: 0.0,
                    }))
                }
                BlockKind::Dwell { seconds } => {
                    block.state = BlockState::Running;
                    Some(Cursor::Dwell { remaining: seconds })
                }
                BlockKind::Command => None,
            },
            None => None,
        };
    }

    /// Retire the running head and start its successor without a gap.
    fn retire_running<const N: usize>(&mut self, buffer: &mut PlannerBuffer<N>) {
        buffer.retire_head();
        self.activate_head(buffer);
    }

    /// Nominal duration of the next slice of `remaining` seconds, and
    /// whether it is the last one.
    fn split(&self, remaining: f32) -> (f32, bool) {
        if remaining <= SPLIT_FACTOR * self.segment_time {
            (remaining.max(0.0), true)
        } else {
            (self.segment_time, false)
        }
    }

    fn motion_segment<const N: usize, K: Kinematics>(
        &mut self,
        buffer: &mut PlannerBuffer<N>,
        kinematics: &K,
    ) -> RuntimeEvent {
        let (Some(Cursor::Motion(mut cursor)), Some(block)) = (self.cursor.take(), buffer.head().copied())
        else {
            return RuntimeEvent::Idle;
        };

        let (dt, last) = self.split(cursor.profile.duration() - cursor.elapsed);
        let t0 = cursor.elapsed;
        let t1 = t0 + dt;
        let (position, distance) = if last {
            (block.target, block.length)
        } else {
            let s = cursor.profile.distance_at(t1).min(block.length);
            (block.point_at(s), s)
        };

        let v0 = cursor.profile.velocity_at(t0);
        let v1 = cursor.profile.velocity_at(t1);
        let phase = cursor.profile.phase_at(t0);
        self.emit(kinematics, &position, dt, v0, v1, phase);

        if last {
            self.retire_running(buffer);
        } else {
            cursor.elapsed = t1;
            cursor.distance = distance;
            self.cursor = Some(Cursor::Motion(cursor));
        }
        RuntimeEvent::Progress
    }

    fn dwell_segment<const N: usize>(&mut self, buffer: &mut PlannerBuffer<N>) -> RuntimeEvent {
        let Some(Cursor::Dwell { remaining }) = self.cursor.take() else {
            return RuntimeEvent::Idle;
        };

        let (dt, last) = self.split(remaining);
        if dt > 0.0 {
            let segment = Segment::idle(self.ticks_for(dt), MotionPhase::Dwell);
            self.push(segment);
            self.phase = MotionPhase::Dwell;
        }

        if last {
            self.retire_running(buffer);
        } else {
            self.cursor = Some(Cursor::Dwell {
                remaining: remaining - dt,
            });
        }
        RuntimeEvent::Progress
    }

    /// Try to plan a stop from the cursor. Returns true once the hold has
    /// started; false means retry at the next segment.
    fn begin_hold<const N: usize>(&mut self, buffer: &PlannerBuffer<N>) -> bool {
        let ramp = match &self.cursor {
            Some(Cursor::Motion(cursor)) => match self.plan_hold(buffer, cursor) {
                Some(ramp) => Some(ramp),
                None => return false,
            },
            // At rest or dwelling: dwell time left is kept
            Some(Cursor::Dwell { .. }) | None => None,
        };

        self.hold = match ramp {
            Some(ramp) => HoldMode::Ramp(ramp),
            None => HoldMode::Stopped { reported: false },
        };
        true
    }

    /// Stop profile from the cursor along the path, if it fits.
    ///
    /// The stop may continue into following blocks only where the hold
    /// velocity at each crossed junction is within the planned exit
    /// velocity there.
    fn plan_hold<const N: usize>(
        &self,
        buffer: &PlannerBuffer<N>,
        cursor: &MotionCursor,
    ) -> Option<HoldRamp> {
        let head = buffer.head()?;
        let velocity = cursor.profile.velocity_at(cursor.elapsed);
        let acceleration = cursor.profile.acceleration_at(cursor.elapsed);

        let (mut accel, mut jerk) = (head.accel, head.jerk);
        if head.exit_velocity > 0.0 {
            for block in buffer.iter().skip(1) {
                if !block.is_motion() {
                    break;
                }
                accel = accel.min(block.accel);
                jerk = jerk.min(block.jerk);
                if block.exit_velocity <= 0.0 {
                    break;
                }
            }
        }

        let profile = Profile::<4>::stop_from(velocity, acceleration, accel, jerk);
        let mut boundary = head.length - cursor.distance;
        let mut index = 0;
        while profile.length() > boundary + DISTANCE_EPSILON {
            let block = buffer.get(index)?;
            let next = buffer.get(index + 1).filter(|b| b.is_motion())?;
            let crossing = profile.velocity_at(profile.time_at_distance(boundary));
            if crossing > block.exit_velocity + VELOCITY_EPSILON {
                return None;
            }
            boundary += next.length;
            index += 1;
        }

        Some(HoldRamp {
            profile,
            elapsed: 0.0,
            offset: -cursor.distance,
        })
    }

    fn hold_segment<const N: usize, K: Kinematics>(
        &mut self,
        buffer: &mut PlannerBuffer<N>,
        kinematics: &K,
    ) -> RuntimeEvent {
        let HoldMode::Ramp(mut ramp) = core::mem::replace(&mut self.hold, HoldMode::Off) else {
            return RuntimeEvent::Idle;
        };
        let (Some(Cursor::Motion(mut cursor)), Some(block)) = (self.cursor.take(), buffer.head().copied())
        else {
            self.hold = HoldMode::Stopped { reported: false };
            return RuntimeEvent::Progress;
        };

        let (dt, last) = self.split(ramp.profile.duration() - ramp.elapsed);
        let t0 = ramp.elapsed;
        let mut t1 = t0 + dt;
        let travelled = if last {
            ramp.profile.length()
        } else {
            ramp.profile.distance_at(t1)
        };
        let mut local = travelled - ramp.offset;

        let crosses = local > block.length + DISTANCE_EPSILON
            && buffer.get(1).is_some_and(MoveBlock::is_motion);
        if crosses {
            // Cut the segment at the junction
            t1 = ramp.profile.time_at_distance(ramp.offset + block.length).max(t0);
            local = block.length;
        } else {
            local = local.min(block.length);
        }

        let position = if crosses {
            block.target
        } else {
            block.point_at(local)
        };
        let v0 = ramp.profile.velocity_at(t0);
        let v1 = ramp.profile.velocity_at(t1);
        self.emit(kinematics, &position, t1 - t0, v0, v1, MotionPhase::Decelerating);
        ramp.elapsed = t1;

        if crosses {
            ramp.offset += block.length;
            self.retire_running(buffer);
            self.hold = HoldMode::Ramp(ramp);
        } else {
            cursor.distance = local;
            self.cursor = Some(Cursor::Motion(cursor));
            self.hold = if last {
                HoldMode::Stopped { reported: false }
            } else {
                HoldMode::Ramp(ramp)
            };
        }
        RuntimeEvent::Progress
    }

    fn ticks_for(&self, dt: f32) -> u32 {
        (roundf(dt * self.tick_hz).max(1.0)) as u32
    }

    /// Queue a segment ending at `position`.
    fn emit<K: Kinematics>(
        &mut self,
        kinematics: &K,
        position: &[f32; AXES],
        dt: f32,
        v0: f32,
        v1: f32,
        phase: MotionPhase,
    ) {
        let target = kinematics.axes_to_steps(position);
        let mut steps = [0i32; MOTORS];
        for (m, s) in steps.iter_mut().enumerate() {
            *s = target[m].wrapping_sub(self.commanded[m]);
        }

        let mut segment = Segment {
            ticks: self.ticks_for(dt),
            steps,
            velocity: v0,
            acceleration: if dt > 0.0 { (v1 - v0) / dt } else { 0.0 },
            phase,
        };
        segment.ticks = segment.ticks.max(segment.max_steps());

        if self.push(segment) {
            self.commanded = target;
            self.phase = phase;
        }
    }

    fn push(&mut self, segment: Segment) -> bool {
        if self.segments.enqueue(segment).is_ok() {
            self.pushed = self.pushed.wrapping_add(1);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Axis, MotorConstraints, MotorMap};
    use crate::kinematics::Cartesian;
    use crate::planner::{MoveKind, VelocitySolver};
    use crate::runtime::{SegmentConsumer, SegmentQueue};

    const STEPS_PER_MM: f32 = 400.0;

    fn constraints() -> MachineConstraints {
        let mut c = MachineConstraints {
            axes: Default::default(),
            motors: heapless::Vec::new(),
            kinematics: crate::config::KinematicsKind::Cartesian,
            cornering_tolerance: 0.01,
            segment_time: 0.001,
            tick_hz: 50_000,
            min_block_length: 1e-4,
        };
        for map in [MotorMap::X, MotorMap::Y] {
            c.motors
                .push(MotorConstraints {
                    map,
                    steps_per_mm: STEPS_PER_MM,
                    invert_direction: false,
                })
                .unwrap();
        }
        c
    }

    fn line(seq: u32, start: [f32; AXES], target: [f32; AXES]) -> MoveBlock {
        let mut b = MoveBlock::stationary(seq, BlockKind::Move(MoveKind::Feed), start);
        b.target = target;
        let d = b.displacement();
        b.length = libm::sqrtf(d.iter().map(|x| x * x).sum());
        for (u, x) in b.unit.iter_mut().zip(d.iter()) {
            *u = x / b.length;
        }
        b.cruise_vmax = 20.0;
        b.accel = 500.0;
        b.jerk = 5000.0;
        b.junction_vmax = 20.0;
        b.entry_vmax = 20.0;
        b
    }

    fn at(x: f32, y: f32) -> [f32; AXES] {
        let mut p = [0.0; AXES];
        p[Axis::X.index()] = x;
        p[Axis::Y.index()] = y;
        p
    }

    /// Drain the queue as the generator would, summing segments.
    fn drain(consumer: &mut SegmentConsumer<'_>, state: &MachineState, total: &mut [i32; MOTORS], segs: &mut u32) {
        let mut n = 0;
        while let Some(segment) = consumer.dequeue() {
            for (t, s) in total.iter_mut().zip(segment.steps.iter()) {
                *t += s;
            }
            assert!(segment.ticks >= segment.max_steps());
            n += 1;
        }
        *segs += n;
        state.finish_segments(n);
    }

    fn run_to_idle<const N: usize>(
        runtime: &mut Runtime<'_>,
        buffer: &mut PlannerBuffer<N>,
        consumer: &mut SegmentConsumer<'_>,
        state: &MachineState,
        kinematics: &Cartesian,
    ) -> ([i32; MOTORS], u32) {
        let mut total = [0; MOTORS];
        let mut segs = 0;
        for _ in 0..100_000 {
            match runtime.step(buffer, kinematics) {
                RuntimeEvent::Idle if runtime.in_flight() == 0 => break,
                RuntimeEvent::Waiting | RuntimeEvent::Idle => drain(consumer, state, &mut total, &mut segs),
                _ => {}
            }
        }
        (total, segs)
    }

    #[test]
    fn test_block_lands_on_target() {
        let c = constraints();
        let kinematics = Cartesian::new(&c.motors);
        let state = MachineState::new();
        let mut queue = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut runtime = Runtime::new(producer, &state, &c);
        let mut buffer: PlannerBuffer<4> = PlannerBuffer::new();
        let mut solver = VelocitySolver::new();

        buffer.push(line(1, at(0.0, 0.0), at(3.0, 4.0))).unwrap();
        solver.plan_appended(&mut buffer);
        let expected_time = buffer.get(0).unwrap().total_time();

        let (total, segs) = run_to_idle(&mut runtime, &mut buffer, &mut consumer, &state, &kinematics);

        assert_eq!(total[..2], [1200, 1600]);
        assert!(buffer.is_empty());
        assert_eq!(runtime.commanded()[..2], [1200, 1600]);
        let nominal = (expected_time / c.segment_time) as u32;
        assert!(segs >= nominal - 1 && segs <= nominal + 1);
    }

    #[test]
    fn test_dwell_emits_timed_idle_segments() {
        let c = constraints();
        let kinematics = Cartesian::new(&c.motors);
        let state = MachineState::new();
        let mut queue = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut runtime = Runtime::new(producer, &state, &c);
        let mut buffer: PlannerBuffer<4> = PlannerBuffer::new();

        buffer
            .push(MoveBlock::stationary(1, BlockKind::Dwell { seconds: 0.0105 }, [0.0; AXES]))
            .unwrap();

        let mut ticks = 0;
        for _ in 0..1000 {
            match runtime.step(&mut buffer, &kinematics) {
                RuntimeEvent::Idle if runtime.in_flight() == 0 => break,
                _ => {
                    let mut n = 0;
                    while let Some(segment) = consumer.dequeue() {
                        assert_eq!(segment.phase, MotionPhase::Dwell);
                        assert_eq!(segment.max_steps(), 0);
                        ticks += segment.ticks;
                        n += 1;
                    }
                    state.finish_segments(n);
                }
            }
        }
        assert_eq!(ticks, 525);
    }

    #[test]
    fn test_command_waits_for_drain() {
        let c = constraints();
        let kinematics = Cartesian::new(&c.motors);
        let state = MachineState::new();
        let mut queue = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut runtime = Runtime::new(producer, &state, &c);
        let mut buffer: PlannerBuffer<4> = PlannerBuffer::new();
        let mut solver = VelocitySolver::new();

        buffer.push(line(1, at(0.0, 0.0), at(0.01, 0.0))).unwrap();
        solver.plan_appended(&mut buffer);
        buffer
            .push(MoveBlock::stationary(2, BlockKind::Command, at(0.01, 0.0)))
            .unwrap();

        let (mut total, mut segs) = ([0; MOTORS], 0);
        let mut waited_at_marker = false;
        loop {
            match runtime.step(&mut buffer, &kinematics) {
                RuntimeEvent::CommandsDue(seq) => {
                    assert_eq!(seq, 2);
                    break;
                }
                RuntimeEvent::Waiting => {
                    if buffer.head().map(|b| b.kind) == Some(BlockKind::Command) {
                        assert!(runtime.in_flight() > 0);
                        waited_at_marker = true;
                    }
                    drain(&mut consumer, &state, &mut total, &mut segs);
                }
                _ => {}
            }
        }

        assert!(waited_at_marker);
        assert_eq!(runtime.in_flight(), 0);
        assert_eq!(total[0], 4);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_hold_stops_short_and_resumes_exactly() {
        let c = constraints();
        let kinematics = Cartesian::new(&c.motors);
        let state = MachineState::new();
        let mut queue = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut runtime = Runtime::new(producer, &state, &c);
        let mut buffer: PlannerBuffer<4> = PlannerBuffer::new();
        let mut solver = VelocitySolver::new();

        buffer.push(line(1, at(0.0, 0.0), at(20.0, 0.0))).unwrap();
        solver.plan_appended(&mut buffer);

        let (mut total, mut segs) = ([0; MOTORS], 0);
        // Run into the cruise
        while segs < 400 {
            runtime.step(&mut buffer, &kinematics);
            drain(&mut consumer, &state, &mut total, &mut segs);
        }

        runtime.request_hold();
        let mut started = false;
        loop {
            match runtime.step(&mut buffer, &kinematics) {
                RuntimeEvent::HoldStarted => started = true,
                RuntimeEvent::HoldComplete => break,
                _ => drain(&mut consumer, &state, &mut total, &mut segs),
            }
        }
        assert!(started);
        assert!(total[0] > 0 && total[0] < 8000);
        assert_eq!(runtime.phase(), MotionPhase::Idle);

        assert!(runtime.release_hold(&mut buffer));
        let head = buffer.head().unwrap();
        assert_eq!(head.state, BlockState::Queued);
        assert!((head.start[0] * STEPS_PER_MM - total[0] as f32).abs() <= 1.0);
        solver.replan_from_rest(&mut buffer);

        let (rest, _) = run_to_idle(&mut runtime, &mut buffer, &mut consumer, &state, &kinematics);
        assert_eq!(total[0] + rest[0], 8000);
    }
}
