//! Stack-discipline bump allocator over a scratch store.

use crate::error::InvariantViolation;
use crate::memory::{BackingStore, StoreRole};
use std::cell::Cell;

/// Bump allocator for per-request scratch data.
///
/// Hands out monotonically increasing, non-overlapping windows of its
/// store and releases them only in reverse order. Allocation takes `&self`
/// so several windows can be held at once; every release path takes
/// `&mut self`, which ends all outstanding windows first.
///
/// # Zeroing
///
/// [`reset`] zeroes `[0, next)` only. Ranges reused after a [`free`] within
/// the same request still hold whatever was last written there, and bytes
/// freed off the top of the stack before a reset survive it: a later request
/// can read them back through `alloc`. Clear sensitive scratch before
/// releasing it with [`free`] or [`rewind`].
///
/// # Memory Layout
///
/// ```text
/// ┌──────────────┬──────────────┬───────────────┬──────────────────┐
/// │ allocation 0 │ allocation 1 │ freed (dirty) │    untouched     │
/// └──────────────┴──────────────┴───────────────┴──────────────────┘
/// 0                             next         high_water         capacity
/// ```
///
/// [`reset`]: BumpAllocator::reset
/// [`free`]: BumpAllocator::free
/// [`rewind`]: BumpAllocator::rewind
pub struct BumpAllocator {
    store: BackingStore,
    /// End of the most recent live allocation.
    next: Cell<usize>,
    /// Furthest byte handed out since the last reset.
    high_water: Cell<usize>,
}

/// Saved allocator position, for releasing without tracking sizes.
///
/// Obtained from [`BumpAllocator::checkpoint`] and consumed by
/// [`BumpAllocator::rewind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a checkpoint does nothing unless passed to rewind"]
pub struct Checkpoint(usize);

impl Checkpoint {
    /// Allocator offset at the time of the checkpoint.
    pub fn offset(self) -> usize {
        self.0
    }
}

impl BumpAllocator {
    /// Create an allocator over `store`. The store must be zeroed.
    pub fn new(store: BackingStore) -> Self {
        debug_assert!(store.bytes().iter().all(|&b| b == 0));
        Self {
            store,
            next: Cell::new(0),
            high_water: Cell::new(0),
        }
    }

    /// Allocate `size` bytes, or report why it cannot be done.
    #[allow(clippy::mut_from_ref)]
    pub fn try_alloc(&self, size: usize) -> Result<&mut [u8], InvariantViolation> {
        let start = self.next.get();
        let capacity = self.store.capacity();
        let end = match start.checked_add(size) {
            Some(end) if end <= capacity => end,
            _ => {
                return Err(InvariantViolation::CapacityExceeded {
                    role: self.store.role(),
                    used: start,
                    requested: size,
                    capacity,
                });
            }
        };

        self.next.set(end);
        if end > self.high_water.get() {
            self.high_water.set(end);
        }

        // SAFETY: `[start, end)` lies inside the store. The cursor only moves
        // forward while `&self` is borrowed, so no other live window overlaps
        // this one, and the store itself is never exposed while windows live.
        let region = unsafe {
            std::slice::from_raw_parts_mut(self.store.base_ptr().add(start), size)
        };
        Ok(region)
    }

    /// Allocate `size` bytes.
    ///
    /// # Panics
    ///
    /// Aborts the request cycle if the store has less than `size` bytes left.
    #[allow(clippy::mut_from_ref)]
    #[track_caller]
    pub fn alloc(&self, size: usize) -> &mut [u8] {
        match self.try_alloc(size) {
            Ok(region) => region,
            Err(violation) => violation.abort(),
        }
    }

    /// Release the most recent `size` bytes, or report an underflow.
    ///
    /// Sizes are not tracked: freeing a different size than was allocated
    /// silently shifts the stack. Prefer [`checkpoint`](Self::checkpoint) and
    /// [`rewind`](Self::rewind) where the sizes are not at hand.
    pub fn try_free(&mut self, size: usize) -> Result<(), InvariantViolation> {
        let next = self.next.get();
        let Some(new_next) = next.checked_sub(size) else {
            return Err(InvariantViolation::StackImbalance {
                role: self.store.role(),
                available: next,
                requested: size,
            });
        };
        self.next.set(new_next);
        Ok(())
    }

    /// Release the most recent `size` bytes.
    ///
    /// # Panics
    ///
    /// Aborts the request cycle if `size` exceeds the bytes in use.
    #[track_caller]
    pub fn free(&mut self, size: usize) {
        if let Err(violation) = self.try_free(size) {
            violation.abort();
        }
    }

    /// Record the current position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.next.get())
    }

    /// Release everything allocated since `checkpoint`.
    pub fn try_rewind(&mut self, checkpoint: Checkpoint) -> Result<(), InvariantViolation> {
        let next = self.next.get();
        if checkpoint.0 > next {
            return Err(InvariantViolation::StackImbalance {
                role: self.store.role(),
                available: next,
                requested: checkpoint.0,
            });
        }
        self.next.set(checkpoint.0);
        Ok(())
    }

    /// Release everything allocated since `checkpoint`.
    ///
    /// # Panics
    ///
    /// Aborts the request cycle if the checkpoint lies above the current
    /// position (already released, or taken before a reset).
    #[track_caller]
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        if let Err(violation) = self.try_rewind(checkpoint) {
            violation.abort();
        }
    }

    /// Zero `[0, next)` and rewind to 0.
    ///
    /// Returns the number of bytes zeroed. Bytes at or beyond the cursor are
    /// left untouched, including any freed off the top since the last reset.
    /// Only the pool calls this, once per request cycle.
    pub(crate) fn reset(&mut self) -> usize {
        let zeroed = self.store.zero_prefix(self.next.get());
        self.next.set(0);
        self.high_water.set(0);
        zeroed
    }

    /// Bytes currently allocated.
    #[inline]
    pub fn offset(&self) -> usize {
        self.next.get()
    }

    /// Furthest offset handed out since the last reset.
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water.get()
    }

    /// Fixed capacity of the scratch store.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Bytes still available.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.offset()
    }

    /// Role of the underlying store.
    pub fn role(&self) -> StoreRole {
        self.store.role()
    }
}

impl std::fmt::Debug for BumpAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BumpAllocator")
            .field("offset", &self.offset())
            .field("high_water", &self.high_water())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Backing;

    fn allocator(capacity: usize) -> BumpAllocator {
        BumpAllocator::new(BackingStore::new(StoreRole::Scratch, capacity, Backing::Heap).unwrap())
    }

    #[test]
    fn test_alloc_advances_offset() {
        let a = allocator(64);
        let first = a.alloc(8);
        let second = a.alloc(16);

        assert_eq!(first.len(), 8);
        assert_eq!(second.len(), 16);
        assert_eq!(a.offset(), 24);
        assert_eq!(a.remaining(), 40);
    }

    #[test]
    fn test_live_windows_do_not_overlap() {
        let a = allocator(64);
        let first = a.alloc(8);
        let second = a.alloc(8);
        first.fill(1);
        second.fill(2);

        assert!(first.iter().all(|&b| b == 1));
        assert!(second.iter().all(|&b| b == 2));
    }

    #[test]
    fn test_stack_law() {
        let mut a = allocator(64);
        a.alloc(8);
        a.alloc(16);
        a.free(16);
        assert_eq!(a.offset(), 8);
    }

    #[test]
    fn test_fresh_allocations_are_zero() {
        let a = allocator(64);
        assert!(a.alloc(32).iter().all(|&b| b == 0));
        assert!(a.alloc(32).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reused_range_keeps_contents() {
        let mut a = allocator(64);
        a.alloc(8).fill(0xEE);
        a.free(8);

        assert!(a.alloc(8).iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn test_reset_zeroes_used_prefix_only() {
        let mut a = allocator(64);
        a.store.bytes_mut()[40..].fill(0x55);
        a.alloc(24).fill(0xFF);

        assert_eq!(a.reset(), 24);
        assert_eq!(a.offset(), 0);
        assert!(a.store.bytes()[..24].iter().all(|&b| b == 0));
        assert!(a.store.bytes()[40..].iter().all(|&b| b == 0x55));
    }

    #[test]
    fn test_reset_leaves_bytes_past_cursor() {
        let mut a = allocator(64);
        a.alloc(24).fill(0xFF);
        a.free(16);

        assert_eq!(a.high_water(), 24);
        assert_eq!(a.reset(), 8);
        assert_eq!(a.offset(), 0);
        assert_eq!(a.high_water(), 0);
        assert!(a.store.bytes()[..8].iter().all(|&b| b == 0));
        assert!(a.store.bytes()[8..24].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_checkpoint_rewind() {
        let mut a = allocator(64);
        a.alloc(4);
        let cp = a.checkpoint();
        a.alloc(10);
        a.alloc(3);

        a.rewind(cp);
        assert_eq!(a.offset(), 4);
        assert_eq!(cp.offset(), 4);
    }

    #[test]
    fn test_rewind_above_cursor_is_violation() {
        let mut a = allocator(64);
        a.alloc(16);
        let cp = a.checkpoint();
        a.free(16);

        assert_eq!(
            a.try_rewind(cp),
            Err(InvariantViolation::StackImbalance {
                role: StoreRole::Scratch,
                available: 0,
                requested: 16,
            })
        );
    }

    #[test]
    fn test_try_alloc_reports_capacity() {
        let a = allocator(64);
        a.alloc(60);
        let err = a.try_alloc(8).unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::CapacityExceeded {
                role: StoreRole::Scratch,
                used: 60,
                requested: 8,
                capacity: 64,
            }
        );
        // A failed attempt does not move the cursor.
        assert_eq!(a.offset(), 60);
    }

    #[test]
    fn test_try_alloc_overflowing_size() {
        let a = allocator(64);
        a.alloc(1);
        assert!(a.try_alloc(usize::MAX).is_err());
    }

    #[test]
    fn test_alloc_exact_capacity() {
        let a = allocator(64);
        assert_eq!(a.alloc(64).len(), 64);
        assert_eq!(a.remaining(), 0);
        assert_eq!(a.alloc(0).len(), 0);
    }

    #[test]
    #[should_panic(expected = "not enough capacity in scratch store: 0 + 65 > 64")]
    fn test_alloc_over_capacity_aborts() {
        let a = allocator(64);
        a.alloc(65);
    }

    #[test]
    #[should_panic(expected = "stack imbalance in scratch store")]
    fn test_free_underflow_aborts() {
        let mut a = allocator(64);
        a.alloc(4);
        a.free(5);
    }
}
