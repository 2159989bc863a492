//! # fusebuf
//!
//! Request-scoped memory for kernel filesystem-protocol servers.
//!
//! Decoding a kernel message and building its reply should never touch the
//! global allocator. fusebuf gives each connection (or worker) a
//! [`BufferPool`] of fixed-capacity stores, sized once for the protocol's
//! worst case, and recycles them between requests:
//!
//! - **Inbound store**: raw request bytes, with a typed header view
//! - **Segmented reply buffer**: headers and payload assembled in place
//! - **Bump allocator**: stack-discipline scratch memory
//! - **Reset**: zeroes exactly what the last request touched
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fusebuf::prelude::*;
//!
//! let mut pool: BufferPool = BufferPool::new(PoolConfig::default())?;
//! loop {
//!     let mut scope = pool.reset();
//!     scope.read_request(&mut device)?;
//!     let header = scope.header()?;
//!     let unique = header.unique();
//!
//!     scope.begin_reply(unique);
//!     scope.response().append(b"...");
//!     scope.finish_reply()?;
//!     scope.write_response(&mut device)?;
//! }
//! ```
//!
//! ## Failure model
//!
//! Recoverable failures come back as [`Error`]. Overflowing a store,
//! releasing more than was taken, or answering twice is an
//! [`InvariantViolation`]: the plain operations abort on it, the `try_*`
//! forms return it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod arena;
pub mod config;
pub mod error;
pub mod memory;
pub mod observability;
pub mod pool;
pub mod scope;
pub mod wire;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::{BumpAllocator, Checkpoint, SegmentedBuffer};
    pub use crate::config::PoolConfig;
    pub use crate::error::{Error, InvariantViolation, Result};
    pub use crate::memory::{Backing, StoreRole};
    pub use crate::pool::{BufferPool, PoolStats};
    pub use crate::scope::{RequestScope, ScopePhase};
    pub use crate::wire::{InHeader, OutHeaderMut};
}

pub use config::PoolConfig;
pub use error::{Error, InvariantViolation, Result};
pub use pool::{BufferPool, PoolStats};
pub use scope::{RequestScope, ScopePhase};
