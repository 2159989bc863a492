//! Per-request arenas.
//!
//! - [`BumpAllocator`]: stack-discipline scratch allocation
//! - [`SegmentedBuffer`]: append-only reply assembly
//!
//! Both abort on a broken sizing or stack contract; see
//! [`InvariantViolation`](crate::error::InvariantViolation).

mod bump;
mod segmented;

pub use bump::{BumpAllocator, Checkpoint};
pub use segmented::SegmentedBuffer;
