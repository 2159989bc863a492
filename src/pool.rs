//! Connection-lifetime buffer pool.
//!
//! The pool owns every backing store a request cycle touches and the state
//! of its single [`RequestScope`]. It is built once per connection (or per
//! worker, when requests are handled concurrently) and reset before every
//! request.
//!
//! # Example
//!
//! ```rust
//! use fusebuf::{BufferPool, PoolConfig};
//! use fusebuf::memory::Backing;
//! use std::io::Cursor;
//!
//! let config = PoolConfig::new(4096, 64 * 1024).with_backing(Backing::Heap);
//! let mut pool: BufferPool = BufferPool::new(config).unwrap();
//!
//! let mut request = vec![0u8; 40];
//! request[0..4].copy_from_slice(&40u32.to_ne_bytes());
//! request[8..16].copy_from_slice(&7u64.to_ne_bytes());
//!
//! let mut scope = pool.reset();
//! scope.read_request(&mut Cursor::new(request)).unwrap();
//! let unique = scope.header().unwrap().unique();
//!
//! scope.begin_reply(unique);
//! scope.response().append(b"hello");
//! scope.finish_reply().unwrap();
//!
//! let mut device = Vec::new();
//! scope.write_response(&mut device).unwrap();
//! assert_eq!(device.len(), 16 + 5);
//! ```

use crate::arena::{BumpAllocator, SegmentedBuffer};
use crate::config::PoolConfig;
use crate::error::Result;
use crate::memory::{AnonymousSegment, Backing, BackingStore, StoreRole};
use crate::observability::{PoolMetrics, trace_pool_created, trace_reset};
use crate::scope::{RequestScope, ScopeState};

/// Statistics about pool usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Resets performed (request cycles started).
    pub resets: u64,
    /// Total bytes zeroed across all resets.
    pub bytes_zeroed: u64,
    /// Largest committed request seen.
    pub peak_request: usize,
    /// Largest reply built.
    pub peak_response: usize,
    /// Largest scratch high-water mark.
    pub peak_scratch: usize,
}

/// Owner of all per-request memory for one connection or worker.
///
/// `C` and `R` are the opaque connection and request references a scope can
/// carry; both are dropped on every reset.
pub struct BufferPool<C = (), R = ()> {
    name: String,
    config: PoolConfig,
    capacity: usize,
    inbound: BackingStore,
    outbound: SegmentedBuffer,
    request_view: SegmentedBuffer,
    response_view: SegmentedBuffer,
    scratch: BumpAllocator,
    state: ScopeState<C, R>,
    stats: PoolStats,
    metrics: PoolMetrics,
}

impl<C, R> BufferPool<C, R> {
    /// Create a pool, allocating all five stores up front.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or memory cannot be
    /// obtained.
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_name("fusebuf-pool", config)
    }

    /// Create a pool with a name used in logs and metric labels.
    pub fn with_name(name: &str, config: PoolConfig) -> Result<Self> {
        let capacity = config.store_capacity()?;
        let store = |role: StoreRole| -> Result<BackingStore> {
            if config.prefault && config.backing == Backing::Anonymous {
                let segment = AnonymousSegment::new(capacity)?;
                segment.prefault(config.page_size);
                Ok(BackingStore::from_segment(role, Box::new(segment)))
            } else {
                BackingStore::new(role, capacity, config.backing)
            }
        };

        let pool = Self {
            name: name.to_string(),
            config,
            capacity,
            inbound: store(StoreRole::Inbound)?,
            outbound: SegmentedBuffer::new(store(StoreRole::Outbound)?),
            request_view: SegmentedBuffer::new(store(StoreRole::RequestView)?),
            response_view: SegmentedBuffer::new(store(StoreRole::ResponseView)?),
            scratch: BumpAllocator::new(store(StoreRole::Scratch)?),
            state: ScopeState::new(),
            stats: PoolStats::default(),
            metrics: PoolMetrics::new(name),
        };

        trace_pool_created(name, &config, capacity);
        Ok(pool)
    }

    /// Start a new request cycle.
    ///
    /// Zeroes exactly the prefixes the previous request used, so the cost
    /// tracks the size of the last message rather than the store capacity.
    /// Then rebinds the scope onto the cleared stores with the responded
    /// flag and bindings cleared.
    pub fn reset(&mut self) -> RequestScope<'_, C, R> {
        self.stats.peak_request = self.stats.peak_request.max(self.state.request_len);
        self.stats.peak_response = self.stats.peak_response.max(self.outbound.len());
        self.stats.peak_scratch = self.stats.peak_scratch.max(self.scratch.high_water());

        let inbound = self.inbound.zero_prefix(self.state.dirty);
        let outbound = self.outbound.clear();
        let views = self.request_view.clear() + self.response_view.clear();
        let scratch = self.scratch.reset();
        self.state.clear();

        let zeroed = inbound + outbound + views + scratch;
        self.stats.resets += 1;
        self.stats.bytes_zeroed += zeroed as u64;
        self.metrics.record_reset(zeroed);
        trace_reset(&self.name, inbound, outbound, views, scratch);

        RequestScope {
            inbound: &mut self.inbound,
            response: &mut self.outbound,
            request_view: &mut self.request_view,
            response_view: &mut self.response_view,
            allocator: &mut self.scratch,
            state: &mut self.state,
            metrics: &self.metrics,
        }
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Capacity of every store.
    pub fn store_capacity(&self) -> usize {
        self.capacity
    }

    /// Usage statistics. Peaks cover completed cycles only.
    pub fn stats(&self) -> PoolStats {
        self.stats.clone()
    }
}

impl<C, R> std::fmt::Debug for BufferPool<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("backing", &self.config.backing)
            .field("stats", &self.stats)
            .finish()
    }
}
