//! Metrics collection using metrics-rs.

use crate::error::InvariantViolation;
use metrics::{Counter, Histogram, Unit, counter, histogram};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const POOL_RESETS: &str = "fusebuf_pool_resets";
const BYTES_ZEROED: &str = "fusebuf_bytes_zeroed";
const RESPONSE_BYTES: &str = "fusebuf_response_bytes";
const INVARIANT_VIOLATIONS: &str = "fusebuf_invariant_violations";

/// Initialize metrics descriptions.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(POOL_RESETS, Unit::Count, "Request cycles started");
    metrics::describe_counter!(
        BYTES_ZEROED,
        Unit::Bytes,
        "Bytes cleared between requests"
    );
    metrics::describe_histogram!(
        RESPONSE_BYTES,
        Unit::Bytes,
        "Size of each finished reply"
    );
    metrics::describe_counter!(
        INVARIANT_VIOLATIONS,
        Unit::Count,
        "Arena invariant violations (each one aborts)"
    );
}

/// Record an invariant violation, labelled by kind.
pub fn record_violation(violation: &InvariantViolation) {
    let kind = match violation {
        InvariantViolation::CapacityExceeded { .. } => "capacity_exceeded",
        InvariantViolation::StackImbalance { .. } => "stack_imbalance",
        InvariantViolation::DoubleResponse => "double_response",
    };
    let store = violation.role().map_or("none", |role| role.as_str());
    counter!(INVARIANT_VIOLATIONS, "kind" => kind, "store" => store).increment(1);
}

/// Metric handles for one pool.
///
/// Registered once at pool construction so the per-request path only bumps
/// pre-resolved handles.
#[derive(Clone)]
pub struct PoolMetrics {
    resets: Counter,
    bytes_zeroed: Counter,
    response_bytes: Histogram,
}

impl PoolMetrics {
    /// Register handles for a pool with the given name.
    pub fn new(pool: &str) -> Self {
        Self {
            resets: counter!(POOL_RESETS, "pool" => pool.to_string()),
            bytes_zeroed: counter!(BYTES_ZEROED, "pool" => pool.to_string()),
            response_bytes: histogram!(RESPONSE_BYTES, "pool" => pool.to_string()),
        }
    }

    /// Record one reset and the bytes it cleared.
    #[inline]
    pub fn record_reset(&self, zeroed: usize) {
        self.resets.increment(1);
        self.bytes_zeroed.increment(zeroed as u64);
    }

    /// Record a finished reply.
    #[inline]
    pub fn record_response(&self, bytes: usize) {
        self.response_bytes.record(bytes as f64);
    }
}

impl std::fmt::Debug for PoolMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolMetrics").finish_non_exhaustive()
    }
}
