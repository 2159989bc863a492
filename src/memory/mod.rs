//! Memory backends for request buffers.
//!
//! # Architecture
//!
//! - [`MemorySegment`]: trait for fixed, zero-initialized memory regions
//! - [`HeapSegment`] / [`AnonymousSegment`]: the two backends
//! - [`BackingStore`]: a segment tagged with its [`StoreRole`] in a pool
//!
//! # Example
//!
//! ```rust
//! use fusebuf::memory::{Backing, BackingStore, StoreRole};
//!
//! let mut store = BackingStore::new(StoreRole::Scratch, 4096, Backing::Heap).unwrap();
//! store.bytes_mut()[..5].copy_from_slice(b"hello");
//! store.zero_prefix(5);
//! assert!(store.bytes().iter().all(|&b| b == 0));
//! ```

mod anonymous;
pub mod defaults;
mod heap;
mod segment;
mod store;

pub use anonymous::AnonymousSegment;
pub use heap::HeapSegment;
pub use segment::{MemorySegment, MemoryType, StoreRole};
pub use store::{Backing, BackingStore};
