//! Producer-facing planner.
//!
//! `Planner` owns the block buffer, the solver, the runtime segment exec,
//! the synchronized command queue, the feedhold controller and the
//! injected toolhead and coolant devices. Everything here runs in the
//! planning context; only [`MachineState`] is shared with the tick
//! context.

use libm::{fabsf, sqrtf};
use log::{debug, error};

use crate::command::{
    CommandQueue, Coolant, CoolantState, NullCoolant, NullToolhead, SpindleDirection, SyncCommand,
    Toolhead, ToolheadState,
};
use crate::config::MachineConstraints;
use crate::error::{FaultReason, InvalidMove, PlanError, Result};
use crate::hold::{FeedholdController, HoldState};
use crate::kinematics::{Kinematics, MachineKinematics};
use crate::runtime::{Runtime, RuntimeEvent, SegmentProducer};
use crate::stepper::MachineState;
use crate::{AXES, PLANNER_BUFFER_LEN};

use super::block::{BlockHandle, BlockKind, MoveBlock, MoveKind};
use super::buffer::PlannerBuffer;
use super::junction::junction_velocity;
use super::profile::MotionPhase;
use super::solver::VelocitySolver;

/// Axis displacement below this is treated as no motion on that axis.
const AXIS_EPSILON: f32 = 1e-7;

/// A requested straight-line move.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MoveRequest {
    /// Absolute axis target in mm.
    pub target: [f32; AXES],
    /// Requested feed rate in mm/min.
    pub feed_rate: f32,
    /// Feed or traverse.
    pub kind: MoveKind,
}

impl MoveRequest {
    /// A cutting move at `feed_rate` mm/min.
    pub fn feed(target: [f32; AXES], feed_rate: f32) -> Self {
        Self {
            target,
            feed_rate,
            kind: MoveKind::Feed,
        }
    }

    /// A rapid move at the axis velocity limits.
    pub fn traverse(target: [f32; AXES]) -> Self {
        Self {
            target,
            feed_rate: f32::MAX,
            kind: MoveKind::Traverse,
        }
    }
}

/// Motion planner and executor for one machine.
pub struct Planner<'a, T: Toolhead = NullToolhead, C: Coolant = NullCoolant> {
    constraints: MachineConstraints,
    kinematics: MachineKinematics,
    buffer: PlannerBuffer<PLANNER_BUFFER_LEN>,
    solver: VelocitySolver,
    runtime: Runtime<'a>,
    commands: CommandQueue,
    hold: FeedholdController,
    state: &'a MachineState,
    toolhead: T,
    coolant: C,
    position: [f32; AXES],
    next_seq: u32,
    fault: Option<FaultReason>,
}

impl<'a> Planner<'a, NullToolhead, NullCoolant> {
    /// A planner without toolhead or coolant devices.
    pub fn motion_only(
        constraints: MachineConstraints,
        segments: SegmentProducer<'a>,
        state: &'a MachineState,
    ) -> Self {
        Self::new(constraints, segments, state, NullToolhead, NullCoolant)
    }
}

impl<'a, T: Toolhead, C: Coolant> Planner<'a, T, C> {
    /// Create a planner feeding `segments`, starting at the position held
    /// in `state`.
    pub fn new(
        constraints: MachineConstraints,
        segments: SegmentProducer<'a>,
        state: &'a MachineState,
        toolhead: T,
        coolant: C,
    ) -> Self {
        let kinematics = MachineKinematics::from_constraints(&constraints);
        let steps = state.position().unwrap_or_default();
        let position = kinematics.motors_to_axes(&steps);
        let runtime = Runtime::new(segments, state, &constraints);
        state.publish_buffer_fill(0);
        state.publish_hold_state(HoldState::Running);

        Self {
            constraints,
            kinematics,
            buffer: PlannerBuffer::new(),
            solver: VelocitySolver::new(),
            runtime,
            commands: CommandQueue::new(),
            hold: FeedholdController::new(),
            state,
            toolhead,
            coolant,
            position,
            next_seq: 1,
            fault: None,
        }
    }

    // Producer interface

    /// Queue a straight-line move.
    pub fn enqueue(&mut self, request: MoveRequest) -> Result<BlockHandle> {
        self.admit()?;

        let mut target = request.target;
        if !target.iter().all(|x| x.is_finite()) {
            return Err(InvalidMove::NonFiniteTarget.into());
        }
        if !request.feed_rate.is_finite() {
            return Err(InvalidMove::NonFiniteFeedRate.into());
        }
        if request.feed_rate <= 0.0 {
            return Err(InvalidMove::ZeroFeedRate.into());
        }

        for (i, axis) in self.constraints.axes.iter().enumerate() {
            if fabsf(target[i] - self.position[i]) <= AXIS_EPSILON {
                target[i] = self.position[i];
                continue;
            }
            if !axis.enabled {
                return Err(InvalidMove::AxisDisabled(i).into());
            }
            if let Some(limits) = axis.limits {
                target[i] = limits.apply(target[i]).ok_or(InvalidMove::SoftLimit {
                    axis: i,
                    target: target[i],
                    min: limits.min.0,
                    max: limits.max.0,
                })?;
            }
        }

        let mut unit = [0.0; AXES];
        for (u, (t, p)) in unit.iter_mut().zip(target.iter().zip(self.position.iter())) {
            *u = t - p;
        }
        let length = sqrtf(unit.iter().map(|d| d * d).sum());
        if length < self.constraints.min_block_length || length <= 0.0 {
            return Err(InvalidMove::TooShort {
                length,
                minimum: self.constraints.min_block_length,
            }
            .into());
        }
        if self.buffer.is_full() {
            return Err(PlanError::BufferFull.into());
        }
        for u in unit.iter_mut() {
            *u /= length;
        }

        let traverse = request.kind == MoveKind::Traverse;
        let limits = self.constraints.limits_along(&unit, traverse);
        let cruise_vmax = (request.feed_rate / 60.0).min(limits.velocity);

        let (junction_vmax, entry_vmax) = match self.buffer.newest() {
            Some(prev) if prev.is_motion() => {
                let accel = prev.accel.min(limits.acceleration);
                let junction =
                    junction_velocity(&prev.unit, &unit, accel, self.constraints.cornering_tolerance);
                (junction, junction.min(cruise_vmax).min(prev.cruise_vmax))
            }
            _ => (0.0, 0.0),
        };

        let seq = self.take_seq();
        let block = MoveBlock {
            seq,
            kind: BlockKind::Move(request.kind),
            start: self.position,
            target,
            unit,
            length,
            feed_rate: request.feed_rate,
            cruise_vmax,
            accel: limits.acceleration,
            jerk: limits.jerk,
            junction_vmax,
            entry_vmax,
            ..MoveBlock::EMPTY
        };
        self.buffer.push(block)?;
        self.solver.plan_appended(&mut self.buffer);
        self.position = target;
        self.state.publish_buffer_fill(self.buffer.len());

        debug!(
            "block {}: {} mm, cruise <= {} mm/s, entry <= {} mm/s",
            seq, length, cruise_vmax, entry_vmax
        );
        Ok(BlockHandle { seq })
    }

    /// Queue a timed pause. Motion stops before it.
    pub fn dwell(&mut self, seconds: f32) -> Result<BlockHandle> {
        self.admit()?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(InvalidMove::InvalidDwell.into());
        }
        let seq = self.next_seq;
        self.buffer
            .push(MoveBlock::stationary(seq, BlockKind::Dwell { seconds }, self.position))?;
        self.take_seq();
        self.state.publish_buffer_fill(self.buffer.len());
        debug!("block {}: dwell {} s", seq, seconds);
        Ok(BlockHandle { seq })
    }

    /// Queue an action to run once all motion queued before it has been
    /// stepped out, and before any motion queued after it starts.
    ///
    /// Consecutive commands share one marker block.
    pub fn queue_command(&mut self, command: SyncCommand) -> Result<BlockHandle> {
        self.command_room()?;
        let seq = match self.buffer.newest() {
            Some(b) if b.kind == BlockKind::Command => b.seq,
            _ => {
                let seq = self.next_seq;
                self.buffer
                    .push(MoveBlock::stationary(seq, BlockKind::Command, self.position))?;
                self.take_seq();
                seq
            }
        };
        self.commands.push(seq, command)?;
        self.state.publish_buffer_fill(self.buffer.len());
        debug!("block {}: command {:?}", seq, command);
        Ok(BlockHandle { seq })
    }

    /// Request a spindle speed. Queued only if it changes the toolhead.
    pub fn spindle_set_speed(&mut self, speed: f32) -> Result<Option<BlockHandle>> {
        self.command_room()?;
        if self.toolhead.set_speed(speed) {
            self.queue_engage().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Request a spindle direction. Queued only if it changes the toolhead.
    pub fn spindle_set_direction(
        &mut self,
        direction: SpindleDirection,
    ) -> Result<Option<BlockHandle>> {
        self.command_room()?;
        if self.toolhead.set_direction(direction) {
            self.queue_engage().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Request the spindle off.
    pub fn spindle_stop(&mut self) -> Result<Option<BlockHandle>> {
        self.command_room()?;
        if self.toolhead.set_direction(SpindleDirection::Off) {
            self.queue_command(SyncCommand::SpindleStop).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Apply a spindle speed override factor immediately.
    pub fn spindle_override(&mut self, factor: f32) -> Result<()> {
        Ok(self.toolhead.set_override(factor)?)
    }

    /// Queue a coolant change.
    pub fn coolant(&mut self, state: CoolantState) -> Result<BlockHandle> {
        self.queue_command(SyncCommand::Coolant(state))
    }

    /// Start a controlled stop. No-op unless running.
    pub fn request_feedhold(&mut self) {
        if self.hold.request_hold() {
            self.runtime.request_hold();
            self.publish();
        }
    }

    /// Continue after a feedhold. No-op unless holding.
    pub fn request_resume(&mut self) {
        if self.hold.request_resume() {
            self.publish();
        }
    }

    /// Stop immediately and drop everything queued.
    pub fn abort(&mut self) -> Result<()> {
        self.hard_fault(FaultReason::Abort)
    }

    /// Hard stop on a fault condition.
    ///
    /// The step generator stops without deceleration, and the buffer and
    /// the command queue are dropped without running anything. Queuing is
    /// refused until [`clear_fault`](Self::clear_fault).
    pub fn hard_fault(&mut self, reason: FaultReason) -> Result<()> {
        error!("hard fault: {:?}, dropping {} blocks", reason, self.buffer.len());
        self.state.request_abort();
        self.buffer.clear();
        self.commands.clear();
        self.hold.abort();
        self.fault = Some(reason);
        self.publish();

        self.toolhead.set_direction(SpindleDirection::Off);
        self.toolhead.stop()?;
        self.coolant.apply(CoolantState::OFF)?;
        Ok(())
    }

    /// Leave the fault state once the step generator has stopped.
    ///
    /// The planned position is resynchronised from the step counts.
    pub fn clear_fault(&mut self) -> Result<()> {
        if self.hold.state() != HoldState::Aborted {
            return Ok(());
        }
        if !self.state.abort_acknowledged() {
            return Err(PlanError::Busy.into());
        }
        let steps = self.state.position().ok_or(PlanError::Busy)?;

        self.runtime.reset(steps);
        self.position = self.kinematics.motors_to_axes(&steps);
        self.state.clear_abort();
        self.hold.clear();
        self.fault = None;
        self.publish();
        Ok(())
    }

    /// Run the planning context for `dt` seconds of elapsed time: feed the
    /// step generator, fire due commands and advance the feedhold.
    pub fn poll(&mut self, dt: f32) -> Result<()> {
        self.toolhead.advance(dt)?;
        if self.hold.state() == HoldState::Aborted {
            return Ok(());
        }

        self.try_resume()?;
        self.pump()?;
        // A resume that arrived during the stop applies once held
        if self.try_resume()? {
            self.pump()?;
        }

        if self.hold.state() == HoldState::Accelerating
            && self.runtime.phase() != MotionPhase::Accelerating
        {
            self.hold.running();
        }
        self.publish();
        Ok(())
    }

    /// Change machine settings.
    ///
    /// Axis limits and cornering tolerance apply to blocks queued from now
    /// on. Motor or kinematics changes need motion to be idle.
    pub fn apply_config(&mut self, constraints: MachineConstraints) -> Result<()> {
        let motion_changed = constraints.motors != self.constraints.motors
            || constraints.kinematics != self.constraints.kinematics;
        if motion_changed {
            if !self.is_idle() {
                return Err(PlanError::Busy.into());
            }
            self.kinematics = MachineKinematics::from_constraints(&constraints);
            let steps = self.kinematics.axes_to_steps(&self.position);
            self.state.set_position(&steps);
            self.runtime.reset(steps);
        }
        self.runtime.set_timing(&constraints);
        self.constraints = constraints;
        Ok(())
    }

    /// Redefine the current position, e.g. after homing.
    pub fn set_position(&mut self, position: [f32; AXES]) -> Result<()> {
        if !self.is_idle() || self.hold.state() != HoldState::Running {
            return Err(PlanError::Busy.into());
        }
        if !position.iter().all(|x| x.is_finite()) {
            return Err(InvalidMove::NonFiniteTarget.into());
        }
        let steps = self.kinematics.axes_to_steps(&position);
        self.state.set_position(&steps);
        self.runtime.reset(steps);
        self.position = position;
        Ok(())
    }

    /// Install a different toolhead, returning the previous one.
    ///
    /// The new device is reset before it takes over.
    pub fn swap_toolhead(&mut self, mut toolhead: T) -> Result<T> {
        toolhead.reset()?;
        Ok(core::mem::replace(&mut self.toolhead, toolhead))
    }

    // Status

    /// A queued or running block.
    pub fn block(&self, handle: BlockHandle) -> Option<&MoveBlock> {
        self.buffer.find(handle.seq)
    }

    /// The block buffer, head first.
    pub fn blocks(&self) -> impl Iterator<Item = &MoveBlock> + '_ {
        self.buffer.iter()
    }

    /// Blocks whose exit had to be clamped to a feasible speed.
    pub fn limit_clamps(&self) -> u32 {
        self.solver.limit_clamps()
    }

    /// Whether nothing is queued or executing.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.runtime.is_idle()
    }

    /// Feedhold state.
    pub fn hold_state(&self) -> HoldState {
        self.hold.state()
    }

    /// Latched fault, if any.
    pub fn fault(&self) -> Option<FaultReason> {
        self.fault
    }

    /// End position of the last queued move in mm.
    pub fn planned_position(&self) -> [f32; AXES] {
        self.position
    }

    /// Current machine position in mm from the step counts.
    pub fn machine_position(&self) -> Option<[f32; AXES]> {
        self.state
            .position()
            .map(|steps| self.kinematics.motors_to_axes(&steps))
    }

    /// Commands waiting for their marker.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Active settings.
    pub fn constraints(&self) -> &MachineConstraints {
        &self.constraints
    }

    /// Active kinematics.
    pub fn kinematics(&self) -> &MachineKinematics {
        &self.kinematics
    }

    /// Active toolhead.
    pub fn toolhead(&self) -> &T {
        &self.toolhead
    }

    /// Coolant device.
    pub fn coolant_device(&self) -> &C {
        &self.coolant
    }

    // Internals

    fn admit(&self) -> core::result::Result<(), PlanError> {
        match self.hold.state() {
            HoldState::Aborted => Err(PlanError::Faulted),
            s if !s.admits_blocks() => Err(PlanError::Held),
            _ => Ok(()),
        }
    }

    fn command_room(&self) -> core::result::Result<(), PlanError> {
        self.admit()?;
        if self.commands.is_full() {
            return Err(PlanError::CommandQueueFull);
        }
        let shares_marker = matches!(self.buffer.newest(), Some(b) if b.kind == BlockKind::Command);
        if !shares_marker && self.buffer.is_full() {
            return Err(PlanError::BufferFull);
        }
        Ok(())
    }

    fn queue_engage(&mut self) -> Result<BlockHandle> {
        let state = ToolheadState {
            speed: self.toolhead.get_speed(),
            direction: self.toolhead.get_direction(),
        };
        self.queue_command(SyncCommand::Engage(state))
    }

    fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    /// Step the runtime until the step generator is saturated or idle.
    fn pump(&mut self) -> Result<()> {
        loop {
            match self.runtime.step(&mut self.buffer, &self.kinematics) {
                RuntimeEvent::Progress => {}
                RuntimeEvent::Waiting | RuntimeEvent::Idle => return Ok(()),
                RuntimeEvent::HoldStarted => self.hold.decelerating(),
                RuntimeEvent::HoldComplete => {
                    self.hold.held();
                    self.toolhead.pause()?;
                    self.coolant.pause()?;
                }
                RuntimeEvent::CommandsDue(marker) => {
                    // The marker is already retired: run every command due
                    // at it and report the first failure afterwards
                    let mut failed = None;
                    while let Some(command) = self.commands.pop_due(marker) {
                        debug!("block {}: firing {:?}", marker, command);
                        if let Err(e) = command.execute(&mut self.toolhead, &mut self.coolant) {
                            error!("block {}: {:?} failed: {:?}", marker, command, e);
                            failed.get_or_insert(e);
                        }
                    }
                    if let Some(e) = failed {
                        self.state.publish_buffer_fill(self.buffer.len());
                        return Err(e.into());
                    }
                }
            }
            self.state.publish_buffer_fill(self.buffer.len());
        }
    }

    /// Leave `ResumeRequested` once pause-sensitive devices are ready.
    /// Returns true if motion was released.
    fn try_resume(&mut self) -> Result<bool> {
        if self.hold.state() != HoldState::ResumeRequested {
            return Ok(false);
        }
        self.toolhead.resume()?;
        self.coolant.resume()?;
        if !self.toolhead.ready_to_resume() {
            return Ok(false);
        }

        if self.runtime.release_hold(&mut self.buffer) {
            self.solver.replan_from_rest(&mut self.buffer);
        }
        self.hold.accelerating();
        Ok(true)
    }

    fn publish(&self) {
        self.state.publish_buffer_fill(self.buffer.len());
        self.state.publish_hold_state(self.hold.state());
    }
}
