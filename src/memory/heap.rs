//! Heap-backed memory segment.

use super::{MemorySegment, MemoryType};
use crate::error::{Error, Result};
use std::ptr::NonNull;

/// A memory segment backed by a heap allocation.
///
/// The allocation is made once, zeroed, and released only on drop.
///
/// # Example
///
/// ```rust
/// use fusebuf::memory::{HeapSegment, MemorySegment};
///
/// let segment = HeapSegment::new(1024).unwrap();
/// assert_eq!(segment.len(), 1024);
/// ```
pub struct HeapSegment {
    /// Start of the leaked boxed slice; reclaimed in `Drop`.
    ptr: NonNull<u8>,
    len: usize,
}

impl HeapSegment {
    /// Create a new zero-initialized heap segment.
    ///
    /// # Errors
    ///
    /// Returns an error if size is 0.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }

        let data: Box<[u8]> = vec![0u8; size].into_boxed_slice();
        let raw = Box::into_raw(data);
        // SAFETY: Box::into_raw never returns null.
        let ptr = unsafe { NonNull::new_unchecked(raw.cast::<u8>()) };

        Ok(Self { ptr, len: size })
    }
}

// SAFETY: the pointer comes from a live boxed slice of `len` zeroed bytes that
// this segment owns exclusively until drop.
unsafe impl MemorySegment for HeapSegment {
    fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::Heap
    }
}

impl Drop for HeapSegment {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        // SAFETY: reconstructs exactly the box leaked in `new`.
        drop(unsafe { Box::from_raw(slice) });
    }
}

// SAFETY: the segment owns its memory exclusively.
unsafe impl Send for HeapSegment {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_segment_creation() {
        let segment = HeapSegment::new(1024).unwrap();
        assert_eq!(segment.len(), 1024);
        assert_eq!(segment.memory_type(), MemoryType::Heap);
    }

    #[test]
    fn test_heap_segment_zero_size_fails() {
        let result = HeapSegment::new(0);
        assert!(result.is_err());
    }

    #[test]
    fn test_heap_segment_read_write() {
        let segment = HeapSegment::new(1024).unwrap();

        let ptr = segment.as_mut_ptr();
        unsafe {
            std::ptr::write(ptr, 42);
            std::ptr::write(ptr.add(1), 43);
        }

        unsafe {
            let slice = segment.as_slice();
            assert_eq!(slice[0], 42);
            assert_eq!(slice[1], 43);
        }
    }

    #[test]
    fn test_heap_segment_is_zeroed() {
        let segment = HeapSegment::new(1024).unwrap();
        unsafe {
            let slice = segment.as_slice();
            assert!(slice.iter().all(|&b| b == 0));
        }
    }
}
