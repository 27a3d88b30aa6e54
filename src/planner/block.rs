//! Move blocks held in the planner buffer.

use crate::AXES;

use super::profile::{Profile, Ramp};

/// How the feed rate ceiling of a move is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoveKind {
    /// Cutting move, bounded by each axis' max feed rate.
    #[default]
    Feed,
    /// Rapid positioning, bounded by each axis' max velocity.
    Traverse,
}

/// What a block does when it reaches the head of the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockKind {
    /// Straight-line motion.
    Move(MoveKind),
    /// Stand still for a number of seconds.
    Dwell {
        /// Dwell duration.
        seconds: f32,
    },
    /// Marker at which synchronized commands fire.
    Command,
}

/// Buffer-state tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockState {
    /// Waiting; the solver may still revise it.
    Queued,
    /// Being consumed by the runtime; immutable.
    Running,
}

/// Handle returned by the planner for a queued block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockHandle {
    /// Monotonic sequence number of the block.
    pub seq: u32,
}

/// One planned linear displacement, dwell or command marker.
///
/// Velocities are in mm/s, times in seconds, lengths in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveBlock {
    /// Sequence number, in enqueue order.
    pub seq: u32,
    /// Move/dwell/command tag.
    pub kind: BlockKind,
    /// Buffer-state tag.
    pub state: BlockState,
    /// Absolute axis position at the start of the block.
    pub start: [f32; AXES],
    /// Absolute axis target.
    pub target: [f32; AXES],
    /// Unit vector of travel.
    pub unit: [f32; AXES],
    /// Path length.
    pub length: f32,
    /// Requested feed rate.
    pub feed_rate: f32,
    /// Cruise ceiling: requested rate bounded by the projected axis limits.
    pub cruise_vmax: f32,
    /// Projected acceleration ceiling.
    pub accel: f32,
    /// Projected jerk ceiling.
    pub jerk: f32,
    /// Cornering ceiling with the previous block.
    pub junction_vmax: f32,
    /// Entry ceiling: junction and both cruise ceilings.
    pub entry_vmax: f32,
    /// Exit ceiling from the backward pass (entry the successors can take).
    pub exit_vmax: f32,
    /// Fastest entry from which the block can still meet `exit_vmax`.
    pub braking_vmax: f32,
    /// Planned entry velocity.
    pub entry_velocity: f32,
    /// Planned cruise (peak) velocity.
    pub cruise_velocity: f32,
    /// Planned exit velocity.
    pub exit_velocity: f32,
    /// Acceleration phase duration.
    pub head_time: f32,
    /// Cruise phase duration.
    pub body_time: f32,
    /// Deceleration phase duration.
    pub tail_time: f32,
}

impl MoveBlock {
    /// An unused slot.
    pub(crate) const EMPTY: Self = Self {
        seq: 0,
        kind: BlockKind::Command,
        state: BlockState::Queued,
        start: [0.0; AXES],
        target: [0.0; AXES],
        unit: [0.0; AXES],
        length: 0.0,
        feed_rate: 0.0,
        cruise_vmax: 0.0,
        accel: 0.0,
        jerk: 0.0,
        junction_vmax: 0.0,
        entry_vmax: 0.0,
        exit_vmax: 0.0,
        braking_vmax: 0.0,
        entry_velocity: 0.0,
        cruise_velocity: 0.0,
        exit_velocity: 0.0,
        head_time: 0.0,
        body_time: 0.0,
        tail_time: 0.0,
    };

    /// A block that stays at `position`.
    pub(crate) fn stationary(seq: u32, kind: BlockKind, position: [f32; AXES]) -> Self {
        Self {
            seq,
            kind,
            start: position,
            target: position,
            ..Self::EMPTY
        }
    }

    /// Whether this block moves the machine.
    #[inline]
    pub fn is_motion(&self) -> bool {
        matches!(self.kind, BlockKind::Move(_))
    }

    /// Per-axis displacement.
    pub fn displacement(&self) -> [f32; AXES] {
        let mut d = [0.0; AXES];
        for (i, out) in d.iter_mut().enumerate() {
            *out = self.target[i] - self.start[i];
        }
        d
    }

    /// Planned travel time.
    #[inline]
    pub fn total_time(&self) -> f32 {
        self.head_time + self.body_time + self.tail_time
    }

    /// Axis position `distance` mm along the block.
    pub fn point_at(&self, distance: f32) -> [f32; AXES] {
        let d = distance.clamp(0.0, self.length);
        let mut p = self.start;
        for (out, u) in p.iter_mut().zip(self.unit.iter()) {
            *out += u * d;
        }
        p
    }

    /// Velocity profile of the planned phases.
    pub fn profile(&self) -> Profile {
        Profile::planned(
            self.entry_velocity,
            self.cruise_velocity,
            self.exit_velocity,
            self.body_time,
            self.accel,
            self.jerk,
        )
    }

    /// Store a plan from entry through peak to exit covering the block length.
    pub(crate) fn set_plan(&mut self, entry: f32, peak: f32, exit: f32) {
        let head = Ramp::new(entry, peak, self.accel, self.jerk);
        let tail = Ramp::new(peak, exit, self.accel, self.jerk);
        let body_len = (self.length - head.length() - tail.length()).max(0.0);

        self.entry_velocity = entry;
        self.cruise_velocity = peak;
        self.exit_velocity = exit;
        self.head_time = head.duration();
        self.tail_time = tail.duration();
        self.body_time = if peak > 0.0 { body_len / peak } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_at_clamps_to_length() {
        let mut block = MoveBlock::stationary(1, BlockKind::Move(MoveKind::Feed), [1.0; AXES]);
        block.target = [4.0, 5.0, 1.0, 1.0, 1.0, 1.0];
        block.length = 5.0;
        block.unit = [0.6, 0.8, 0.0, 0.0, 0.0, 0.0];

        assert_eq!(block.point_at(10.0), block.point_at(5.0));
        let mid = block.point_at(2.5);
        assert!((mid[0] - 2.5).abs() < 1e-6);
        assert!((mid[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_plan_times_cover_length() {
        let mut block = MoveBlock::stationary(1, BlockKind::Move(MoveKind::Feed), [0.0; AXES]);
        block.length = 10.0;
        block.accel = 500.0;
        block.jerk = 5000.0;
        block.set_plan(0.0, 20.0, 0.0);

        let profile = block.profile();
        assert!((profile.duration() - block.total_time()).abs() < 1e-5);
        assert!((profile.length() - 10.0).abs() < 1e-3);
    }
}
