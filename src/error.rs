//! Error types for fusebuf.
//!
//! Two kinds of failure exist and they never mix:
//!
//! - [`Error`]: ordinary, recoverable failures (bad configuration, failed
//!   mapping, short reads, device I/O). Returned through [`Result`].
//! - [`InvariantViolation`]: a broken sizing or stack-discipline contract
//!   inside a request cycle. The plain operations abort on it; the `try_*`
//!   operations hand it back so callers and tests can observe it.

use crate::memory::StoreRole;
use thiserror::Error;

/// Result type alias using fusebuf's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable error type for fusebuf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Pool configuration is unusable.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// Backing memory could not be obtained.
    #[error("memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Fewer bytes than a fixed-size header are available.
    #[error("short header: need {needed} bytes, have {available}")]
    ShortHeader {
        /// Size of the header being overlaid.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// A committed request is larger than the inbound store.
    #[error("request of {len} bytes exceeds inbound capacity of {capacity} bytes")]
    RequestTooLarge {
        /// Requested length.
        len: usize,
        /// Inbound store capacity.
        capacity: usize,
    },

    /// A finished reply is too long for the header's length field.
    #[error("reply of {len} bytes does not fit the header length field")]
    ReplyTooLarge {
        /// Reply length.
        len: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System call error (via rustix).
    #[error("system error: {0}")]
    System(#[from] rustix::io::Errno),
}

/// A violated arena invariant.
///
/// These are programming errors upstream (mis-sized pool, unbalanced
/// free/truncate, double reply), never conditions to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A segment or allocation does not fit in the remaining headroom.
    #[error("not enough capacity in {role} store: {used} + {requested} > {capacity}")]
    CapacityExceeded {
        /// Store that overflowed.
        role: StoreRole,
        /// Bytes already in use.
        used: usize,
        /// Bytes requested.
        requested: usize,
        /// Fixed store capacity.
        capacity: usize,
    },

    /// A free, rewind or truncate goes below what was handed out.
    #[error("stack imbalance in {role} store: releasing {requested} bytes with only {available} in use")]
    StackImbalance {
        /// Store that underflowed.
        role: StoreRole,
        /// Bytes currently in use.
        available: usize,
        /// Bytes the caller tried to release.
        requested: usize,
    },

    /// The request was already answered during this scope occupancy.
    #[error("request already responded")]
    DoubleResponse,
}

impl InvariantViolation {
    /// Terminate the current request cycle.
    ///
    /// Logs the violation, counts it, and panics with its message. Release
    /// builds are compiled with `panic = "abort"`, so this ends the process.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn abort(self) -> ! {
        tracing::error!(violation = %self, "arena invariant violated");
        crate::observability::record_violation(&self);
        panic!("{self}")
    }

    /// Store the violation refers to, if any.
    pub fn role(&self) -> Option<StoreRole> {
        match self {
            InvariantViolation::CapacityExceeded { role, .. }
            | InvariantViolation::StackImbalance { role, .. } => Some(*role),
            InvariantViolation::DoubleResponse => None,
        }
    }
}
