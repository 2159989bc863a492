//! Anonymous-mapping memory segment.
//!
//! Pool stores are sized for the protocol's worst case (a page plus a 16 MiB
//! write), and every pool carries five of them. A private anonymous mapping
//! keeps that cheap: the kernel hands out zero pages lazily, so only the
//! prefix that requests actually touch becomes resident.

use super::{MemorySegment, MemoryType};
use crate::error::{Error, Result};
use rustix::mm::{MapFlags, ProtFlags};
use std::ptr::NonNull;

/// A memory segment backed by a private anonymous `mmap`.
pub struct AnonymousSegment {
    /// Pointer to the mmap'd region.
    ptr: NonNull<u8>,
    /// Size of the mapping in bytes.
    len: usize,
}

impl AnonymousSegment {
    /// Map a new zero-filled region of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if size is zero or `mmap` fails.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }

        let ptr = unsafe {
            rustix::mm::mmap_anonymous(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )?
        };

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| Error::AllocationFailed("mmap returned null".into()))?;

        Ok(Self { ptr, len: size })
    }

    /// Touch every page so first requests do not pay for page faults.
    pub fn prefault(&self, page_size: usize) {
        let ptr = self.ptr.as_ptr();
        for offset in (0..self.len).step_by(page_size.max(1)) {
            unsafe {
                // Volatile read to prevent optimization
                std::ptr::read_volatile(ptr.add(offset));
            }
        }
    }
}

// SAFETY: the mapping is private, readable and writable, zero-filled by the
// kernel, and stays mapped at the same address until drop.
unsafe impl MemorySegment for AnonymousSegment {
    fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::Anonymous
    }
}

impl Drop for AnonymousSegment {
    fn drop(&mut self) {
        unsafe {
            let _ = rustix::mm::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

// SAFETY: the mapping is private to this segment.
unsafe impl Send for AnonymousSegment {}
