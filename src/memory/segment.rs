//! Memory segment trait and types.

use std::fmt;

/// Type of memory backing a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryType {
    /// Regular heap memory from the global allocator.
    Heap,
    /// Private anonymous mapping.
    ///
    /// Pages are zero-filled by the kernel on first touch, so a large store
    /// only costs resident memory for the prefix that requests actually use.
    Anonymous,
}

/// What a backing store is used for within a pool.
///
/// Every pool holds exactly one store per role, all of the same capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreRole {
    /// Raw request bytes read from the kernel device.
    Inbound,
    /// Raw reply bytes written back to the kernel device.
    Outbound,
    /// Decoder-side staging for normalized request data.
    RequestView,
    /// Handler-side staging for reply bodies built before their size is known.
    ResponseView,
    /// Bump allocator scratch space.
    Scratch,
}

impl StoreRole {
    /// All roles, in pool construction order.
    pub const ALL: [StoreRole; 5] = [
        StoreRole::Inbound,
        StoreRole::Outbound,
        StoreRole::RequestView,
        StoreRole::ResponseView,
        StoreRole::Scratch,
    ];

    /// Short lowercase name, used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            StoreRole::Inbound => "inbound",
            StoreRole::Outbound => "outbound",
            StoreRole::RequestView => "request-view",
            StoreRole::ResponseView => "response-view",
            StoreRole::Scratch => "scratch",
        }
    }
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for memory segment backends.
///
/// A memory segment is a contiguous, fixed-size, zero-initialized region that
/// lives at one address for its whole lifetime.
///
/// # Safety
///
/// Implementations must ensure that:
/// - `as_mut_ptr()` is valid for reads and writes of `len()` bytes for the
///   lifetime of the segment, and carries write provenance
/// - the region is zero-filled when the segment is created
/// - the address and length never change
pub unsafe trait MemorySegment: Send {
    /// Get a raw pointer to the start of this segment.
    fn as_ptr(&self) -> *const u8 {
        self.as_mut_ptr().cast_const()
    }

    /// Get a mutable pointer to the start of this segment.
    fn as_mut_ptr(&self) -> *mut u8;

    /// Total size of the segment in bytes.
    fn len(&self) -> usize;

    /// Returns true if the segment has zero length.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The type of memory backing this segment.
    fn memory_type(&self) -> MemoryType;

    /// Get the segment as a byte slice.
    ///
    /// # Safety
    ///
    /// The caller must ensure no mutable references to this memory exist.
    unsafe fn as_slice(&self) -> &[u8] {
        // SAFETY: pointer validity comes from the trait contract; aliasing is
        // guaranteed by the caller.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len()) }
    }

    /// Get the segment as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// The caller must ensure exclusive access to this memory.
    #[allow(clippy::mut_from_ref)]
    unsafe fn as_mut_slice(&self) -> &mut [u8] {
        // SAFETY: pointer validity comes from the trait contract; exclusivity
        // is guaranteed by the caller.
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.len()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(StoreRole::Inbound.to_string(), "inbound");
        assert_eq!(StoreRole::ResponseView.as_str(), "response-view");
        assert_eq!(StoreRole::ALL.len(), 5);
    }
}
