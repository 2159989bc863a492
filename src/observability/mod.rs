//! Observability features: metrics and tracing.
//!
//! - **Metrics**: counters and histograms via `metrics-rs`
//! - **Tracing**: structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `fusebuf_pool_resets` | Counter | Request cycles started |
//! | `fusebuf_bytes_zeroed` | Counter | Bytes cleared between requests |
//! | `fusebuf_response_bytes` | Histogram | Size of each finished reply |
//! | `fusebuf_invariant_violations` | Counter | Aborting contract violations |

mod metrics;
mod tracing_support;

pub use self::metrics::{PoolMetrics, init_metrics, record_violation};
pub use self::tracing_support::{
    instrument_request, span_request, trace_pool_created, trace_reply, trace_reset,
};
