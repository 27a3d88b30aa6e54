//! Backward/forward velocity planning over the buffer.
//!
//! The backward pass walks from the newest block toward the head,
//! computing for each block the fastest entry from which everything after
//! it can still stop (`braking_vmax`). It stops at the first block whose
//! exit ceiling did not change, at a stop point (dwell or command), or at
//! the running block. The forward pass then re-profiles every block after
//! that point from the actual entry speed.

use log::warn;

use super::block::MoveBlock;
use super::buffer::PlannerBuffer;
use super::profile::{max_reachable, min_reachable, ramp_length, triangle_peak};

/// Relative slack allowed on length checks before a block counts as infeasible.
const LENGTH_TOLERANCE: f32 = 1e-4;

/// Velocity profile solver.
#[derive(Debug, Clone, Default)]
pub struct VelocitySolver {
    clamps: u32,
}

impl VelocitySolver {
    /// Create a solver.
    pub const fn new() -> Self {
        Self { clamps: 0 }
    }

    /// Number of blocks whose exit had to be clamped to a feasible speed.
    #[inline]
    pub fn limit_clamps(&self) -> u32 {
        self.clamps
    }

    /// Re-plan after the newest block was appended.
    pub fn plan_appended<const N: usize>(&mut self, buffer: &mut PlannerBuffer<N>) {
        let Some(newest) = buffer.len().checked_sub(1) else {
            return;
        };
        let first = buffer.first_queued();
        if newest < first {
            return;
        }

        let forward_from = backward_pass(buffer, first, newest, false);
        self.forward_pass(buffer, forward_from, newest);
    }

    /// Re-plan every queued block with the head starting from rest.
    ///
    /// Used after a feedhold, when the partially executed block has been
    /// shortened to its remaining length.
    pub fn replan_from_rest<const N: usize>(&mut self, buffer: &mut PlannerBuffer<N>) {
        let Some(newest) = buffer.len().checked_sub(1) else {
            return;
        };
        let first = buffer.first_queued();
        if newest < first {
            return;
        }

        // Lengths may have changed, so rebuild the braking ceilings in full.
        backward_pass(buffer, first, newest, true);
        self.forward_pass(buffer, first, newest);
    }

    fn forward_pass<const N: usize>(&mut self, buffer: &mut PlannerBuffer<N>, from: usize, to: usize) {
        for i in from..=to {
            let entry = entry_speed(buffer, i);
            if let Some(block) = buffer.get_mut(i) {
                if block.is_motion() && self.set_profile(block, entry) {
                    warn!(
                        "block {}: cannot slow from {} mm/s to {} mm/s in {} mm, exit clamped to {}",
                        block.seq, entry, block.exit_vmax, block.length, block.exit_velocity
                    );
                }
            }
        }
    }

    /// Profile one block from `entry`. Returns true if the exit was clamped.
    fn set_profile(&mut self, block: &mut MoveBlock, entry: f32) -> bool {
        let (length, accel, jerk) = (block.length, block.accel, block.jerk);
        let ceiling = block.cruise_vmax.max(entry);
        let mut clamped = false;

        let exit = if block.exit_vmax >= entry {
            max_reachable(entry, length, block.exit_vmax, accel, jerk)
        } else if ramp_length(block.exit_vmax, entry, accel, jerk) <= length * (1.0 + LENGTH_TOLERANCE) {
            block.exit_vmax
        } else {
            self.clamps = self.clamps.wrapping_add(1);
            clamped = true;
            min_reachable(entry, length, accel, jerk)
        };

        let head = ramp_length(entry, ceiling, accel, jerk);
        let tail = ramp_length(ceiling, exit, accel, jerk);
        let peak = if head + tail <= length {
            ceiling
        } else {
            triangle_peak(entry, exit, length, ceiling, accel, jerk)
        };

        block.set_plan(entry, peak, exit);
        clamped
    }
}

/// Speed at which block `i` will be entered.
fn entry_speed<const N: usize>(buffer: &PlannerBuffer<N>, i: usize) -> f32 {
    match i.checked_sub(1).and_then(|p| buffer.get(p)) {
        Some(prev) if prev.is_motion() => prev.exit_velocity,
        _ => 0.0,
    }
}

/// Returns the index the forward pass must start from.
///
/// Without `full`, the walk ends early at the first block whose exit
/// ceiling is unchanged.
fn backward_pass<const N: usize>(
    buffer: &mut PlannerBuffer<N>,
    first: usize,
    newest: usize,
    full: bool,
) -> usize {
    let mut limit = 0.0;
    let mut i = newest;

    loop {
        let Some(block) = buffer.get_mut(i) else {
            return i + 1;
        };
        if !block.is_motion() {
            return i + 1;
        }
        if !full && i != newest && block.exit_vmax == limit {
            return i + 1;
        }

        block.exit_vmax = limit;
        block.braking_vmax = block
            .entry_vmax
            .min(max_reachable(limit, block.length, block.entry_vmax, block.accel, block.jerk));
        limit = block.braking_vmax;

        if i == first {
            return first;
        }
        i -= 1;
    }
}
