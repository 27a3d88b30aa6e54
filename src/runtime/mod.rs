//! Runtime layer between the planner buffer and the step generator.

mod exec;
mod segment;

pub use exec::{Runtime, RuntimeEvent, MAX_IN_FLIGHT};
pub use segment::{Segment, SegmentConsumer, SegmentProducer, SegmentQueue};
