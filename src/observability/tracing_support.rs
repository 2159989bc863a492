//! Tracing integration for structured logging and spans.

use crate::config::PoolConfig;
use tracing::{Level, Span, span};

/// Create a span covering one request cycle.
///
/// # Example
///
/// ```rust,ignore
/// use fusebuf::observability::span_request;
///
/// let span = span_request(header.unique(), header.opcode());
/// let _guard = span.enter();
/// // Handle the request here...
/// ```
#[inline]
pub fn span_request(unique: u64, opcode: u32) -> Span {
    span!(Level::DEBUG, "request", unique = unique, opcode = opcode)
}

/// Enter a request span and return its guard.
pub fn instrument_request(unique: u64, opcode: u32) -> tracing::span::EnteredSpan {
    span_request(unique, opcode).entered()
}

/// Log pool construction.
#[inline]
pub fn trace_pool_created(name: &str, config: &PoolConfig, capacity: usize) {
    tracing::debug!(
        pool = %name,
        page_size = config.page_size,
        max_write = config.max_write,
        backing = ?config.backing,
        store_capacity = capacity,
        "buffer pool created"
    );
}

/// Log one reset with the bytes it cleared per store.
#[inline]
pub fn trace_reset(name: &str, inbound: usize, outbound: usize, views: usize, scratch: usize) {
    tracing::trace!(
        pool = %name,
        inbound = inbound,
        outbound = outbound,
        views = views,
        scratch = scratch,
        "buffer pool reset"
    );
}

/// Log a finished reply.
#[inline]
pub fn trace_reply(unique: u64, error: i32, len: usize) {
    tracing::trace!(unique = unique, error = error, len = len, "reply finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_creation() {
        // These should not panic
        let _span = span_request(1, 3);
        let _guard = instrument_request(2, 4);
    }

    #[test]
    fn test_trace_functions() {
        // These should not panic even without a subscriber
        trace_pool_created("test", &PoolConfig::new(4096, 4096), 8192);
        trace_reset("test", 40, 16, 0, 8);
        trace_reply(1, 0, 16);
    }
}
