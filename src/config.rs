//! Pool configuration.
//!
//! Sizing is fixed when a pool is built. Nothing here is process-global, so
//! pools with different limits can coexist.

use crate::error::{Error, Result};
use crate::memory::Backing;
use crate::memory::defaults::{MAX_WRITE, store_capacity, system_page_size};
use crate::wire::IN_HEADER_LEN;

/// Construction-time configuration for a [`BufferPool`](crate::BufferPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Platform page size; bounds every request except write payloads.
    pub page_size: usize,
    /// Largest write payload the kernel may send.
    pub max_write: usize,
    /// Memory backend for all five stores.
    pub backing: Backing,
    /// Touch every page of every store at construction.
    pub prefault: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            page_size: system_page_size(),
            max_write: MAX_WRITE,
            backing: Backing::default(),
            prefault: false,
        }
    }
}

impl PoolConfig {
    /// Config with explicit limits and default backing.
    pub fn new(page_size: usize, max_write: usize) -> Self {
        Self {
            page_size,
            max_write,
            backing: Backing::default(),
            prefault: false,
        }
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the maximum write payload.
    pub fn with_max_write(mut self, max_write: usize) -> Self {
        self.max_write = max_write;
        self
    }

    /// Set the memory backend.
    pub fn with_backing(mut self, backing: Backing) -> Self {
        self.backing = backing;
        self
    }

    /// Enable or disable prefaulting.
    pub fn with_prefault(mut self, prefault: bool) -> Self {
        self.prefault = prefault;
        self
    }

    /// Capacity of every store, `page_size + max_write`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an unusable configuration.
    pub fn store_capacity(&self) -> Result<usize> {
        self.validate()?;
        store_capacity(self.page_size, self.max_write)
            .ok_or_else(|| Error::InvalidConfig("store capacity overflows usize".into()))
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || !self.page_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "page size must be a non-zero power of two, got {}",
                self.page_size
            )));
        }
        if self.page_size < IN_HEADER_LEN {
            return Err(Error::InvalidConfig(format!(
                "page size {} cannot hold a {IN_HEADER_LEN}-byte request header",
                self.page_size
            )));
        }
        if self.max_write == 0 {
            return Err(Error::InvalidConfig("max write must be > 0".into()));
        }
        if store_capacity(self.page_size, self.max_write).is_none() {
            return Err(Error::InvalidConfig("store capacity overflows usize".into()));
        }
        Ok(())
    }
}
