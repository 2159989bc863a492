//! Fixed-capacity backing stores.

use super::{AnonymousSegment, HeapSegment, MemorySegment, MemoryType, StoreRole};
use crate::error::Result;
use std::fmt;

/// Which segment implementation backs a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backing {
    /// Zeroed heap allocation.
    Heap,
    /// Private anonymous mapping (lazily zero-filled by the kernel).
    #[default]
    Anonymous,
}

/// A fixed-capacity byte region reused across every request for its role.
///
/// The store never grows, shrinks or moves. Zeroing is explicit: callers
/// clear exactly the prefix they dirtied.
pub struct BackingStore {
    segment: Box<dyn MemorySegment>,
    role: StoreRole,
}

impl BackingStore {
    /// Allocate a zero-filled store of `capacity` bytes.
    pub fn new(role: StoreRole, capacity: usize, backing: Backing) -> Result<Self> {
        let segment: Box<dyn MemorySegment> = match backing {
            Backing::Heap => Box::new(HeapSegment::new(capacity)?),
            Backing::Anonymous => Box::new(AnonymousSegment::new(capacity)?),
        };
        Ok(Self::from_segment(role, segment))
    }

    /// Wrap an existing segment.
    pub fn from_segment(role: StoreRole, segment: Box<dyn MemorySegment>) -> Self {
        Self { segment, role }
    }

    /// Role of this store within its pool.
    #[inline]
    pub fn role(&self) -> StoreRole {
        self.role
    }

    /// Fixed capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.segment.len()
    }

    /// Memory type of the underlying segment.
    pub fn memory_type(&self) -> MemoryType {
        self.segment.memory_type()
    }

    /// Whole store, read-only.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: `&self` excludes every `&mut` path through this store.
        unsafe { self.segment.as_slice() }
    }

    /// Whole store, writable.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: `&mut self` gives exclusive access.
        unsafe { self.segment.as_mut_slice() }
    }

    /// Zero bytes `[0, len)` and return how many were cleared.
    ///
    /// `len` is clamped to the capacity.
    pub fn zero_prefix(&mut self, len: usize) -> usize {
        let len = len.min(self.capacity());
        self.bytes_mut()[..len].fill(0);
        len
    }

    /// Raw base pointer for owners that hand out disjoint windows.
    #[inline]
    pub(crate) fn base_ptr(&self) -> *mut u8 {
        self.segment.as_mut_ptr()
    }
}

impl fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStore")
            .field("role", &self.role)
            .field("capacity", &self.capacity())
            .field("memory_type", &self.memory_type())
            .finish()
    }
}
