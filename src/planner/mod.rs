//! Lookahead planning.
//!
//! Move requests become [`MoveBlock`]s in a fixed ring. On every append
//! the [`VelocitySolver`] revises the queued blocks so that each one can
//! still stop by the end of the queue, and the [`Planner`] drives the
//! runtime that executes them.

mod block;
mod buffer;
mod control;
mod junction;
mod profile;
mod solver;

pub use block::{BlockHandle, BlockKind, BlockState, MoveBlock, MoveKind};
pub use buffer::PlannerBuffer;
pub use control::{MoveRequest, Planner};
pub use junction::junction_velocity;
pub use profile::{
    max_reachable, min_reachable, ramp_length, triangle_peak, MotionPhase, Piece, Profile, Ramp,
};
pub use solver::VelocitySolver;
