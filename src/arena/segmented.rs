//! Append-only segmented writer.
//!
//! The protocol requires every reply to be one contiguous byte array made of
//! several headers followed by data. `SegmentedBuffer` builds that array in
//! place: each [`new_segment`](SegmentedBuffer::new_segment) appends a
//! zeroed region at the current end and hands it back for the caller to
//! fill, so nothing is encoded elsewhere and copied in afterwards.

use crate::error::InvariantViolation;
use crate::memory::{BackingStore, StoreRole};

/// Length-tracked writer over a fixed store.
///
/// Every byte in `[len, capacity)` is zero at all times. That is what lets
/// `new_segment` return zeroed memory without clearing it first, and it is
/// why [`truncate`](Self::truncate) and [`clear`](Self::clear) zero what they
/// remove.
pub struct SegmentedBuffer {
    store: BackingStore,
    len: usize,
}

impl SegmentedBuffer {
    /// Create an empty buffer over `store`. The store must be zeroed.
    pub fn new(store: BackingStore) -> Self {
        debug_assert!(store.bytes().iter().all(|&b| b == 0));
        Self { store, len: 0 }
    }

    /// Append `size` zeroed bytes, or report why it cannot be done.
    pub fn try_new_segment(&mut self, size: usize) -> Result<&mut [u8], InvariantViolation> {
        let start = self.len;
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

        self.len = end;
        let segment = &mut self.store.bytes_mut()[start..end];
        debug_assert!(segment.iter().all(|&b| b == 0));
        Ok(segment)
    }

    /// Append `size` zeroed bytes and return them.
    ///
    /// # Panics
    ///
    /// Aborts the request cycle if the segment does not fit. Stores are sized
    /// for the largest message the protocol allows, so this only happens on
    /// a sizing bug upstream.
    #[track_caller]
    pub fn new_segment(&mut self, size: usize) -> &mut [u8] {
        match self.try_new_segment(size) {
            Ok(segment) => segment,
            Err(violation) => violation.abort(),
        }
    }

    /// Append a copy of `data`.
    #[track_caller]
    pub fn append(&mut self, data: &[u8]) {
        self.new_segment(data.len()).copy_from_slice(data);
    }

    /// Zero and remove the last `n` written bytes, or report an underflow.
    pub fn try_truncate(&mut self, n: usize) -> Result<(), InvariantViolation> {
        let Some(new_len) = self.len.checked_sub(n) else {
            return Err(InvariantViolation::StackImbalance {
                role: self.store.role(),
                available: self.len,
                requested: n,
            });
        };
        let len = self.len;
        self.store.bytes_mut()[new_len..len].fill(0);
        self.len = new_len;
        Ok(())
    }

    /// Zero and remove the last `n` written bytes.
    ///
    /// Used to unwind a partially built reply, e.g. when switching from a
    /// success reply to an error reply.
    ///
    /// # Panics
    ///
    /// Aborts the request cycle if `n` exceeds the written length.
    #[track_caller]
    pub fn truncate(&mut self, n: usize) {
        if let Err(violation) = self.try_truncate(n) {
            violation.abort();
        }
    }

    /// Zero everything written and return to empty.
    ///
    /// Returns the number of bytes zeroed.
    pub fn clear(&mut self) -> usize {
        let zeroed = self.store.zero_prefix(self.len);
        self.len = 0;
        zeroed
    }

    /// The contiguous contents written so far.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.store.bytes()[..self.len]
    }

    /// Written contents, for patching fields after the fact (e.g. a length).
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.store.bytes_mut()[..len]
    }

    /// Bytes written.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed capacity of the store.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Bytes that can still be appended.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Role of the underlying store.
    pub fn role(&self) -> StoreRole {
        self.store.role()
    }
}

impl std::fmt::Debug for SegmentedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedBuffer")
            .field("role", &self.role())
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Backing;

    fn buffer(capacity: usize) -> SegmentedBuffer {
        SegmentedBuffer::new(BackingStore::new(StoreRole::Outbound, capacity, Backing::Heap).unwrap())
    }

    #[test]
    fn test_segments_are_contiguous() {
        let mut buf = buffer(64);

        buf.new_segment(10).fill(1);
        assert_eq!(buf.len(), 10);

        let second = buf.new_segment(20);
        assert!(second.iter().all(|&b| b == 0));
        second.fill(2);
        assert_eq!(buf.len(), 30);

        assert!(buf.as_bytes()[..10].iter().all(|&b| b == 1));
        assert!(buf.as_bytes()[10..30].iter().all(|&b| b == 2));
    }

    #[test]
    fn test_truncate_then_segment() {
        let mut buf = buffer(64);
        buf.new_segment(10).fill(1);
        buf.new_segment(20).fill(2);

        buf.truncate(20);
        assert_eq!(buf.len(), 10);
        assert!(buf.store.bytes()[10..30].iter().all(|&b| b == 0));

        let third = buf.new_segment(5);
        assert_eq!(third.len(), 5);
        assert!(third.iter().all(|&b| b == 0));
        assert_eq!(buf.len(), 15);
    }

    #[test]
    fn test_truncate_everything_then_segment() {
        let mut buf = buffer(32);
        buf.new_segment(12).fill(0x7F);
        buf.new_segment(4).fill(0x7F);

        buf.truncate(16);
        assert!(buf.is_empty());
        assert!(buf.as_bytes().is_empty());
        assert_eq!(buf.remaining(), 32);

        let fresh = buf.new_segment(16);
        assert!(fresh.iter().all(|&b| b == 0));
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_truncate_restores_zeroed_region() {
        let mut buf = buffer(32);
        buf.new_segment(8).fill(0xFF);
        buf.new_segment(8).fill(0xFF);

        buf.truncate(8);
        let restored = buf.new_segment(8);
        assert!(restored.iter().all(|&b| b == 0));
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_fill_to_capacity() {
        let mut buf = buffer(16);
        buf.new_segment(16);
        assert_eq!(buf.remaining(), 0);
        assert_eq!(buf.new_segment(0).len(), 0);
    }

    #[test]
    fn test_append_and_patch() {
        let mut buf = buffer(32);
        buf.new_segment(4);
        buf.append(b"payload");
        buf.as_bytes_mut()[..4].copy_from_slice(&11u32.to_le_bytes());

        assert_eq!(&buf.as_bytes()[4..], b"payload");
        assert_eq!(&buf.as_bytes()[..4], &11u32.to_le_bytes());
    }

    #[test]
    fn test_clear() {
        let mut buf = buffer(32);
        buf.append(&[7; 12]);
        assert_eq!(buf.clear(), 12);
        assert!(buf.is_empty());
        assert!(buf.store.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_try_variants_report_violations() {
        let mut buf = buffer(8);
        buf.new_segment(6);

        assert_eq!(
            buf.try_new_segment(3).unwrap_err(),
            InvariantViolation::CapacityExceeded {
                role: StoreRole::Outbound,
                used: 6,
                requested: 3,
                capacity: 8,
            }
        );
        assert_eq!(
            buf.try_truncate(7),
            Err(InvariantViolation::StackImbalance {
                role: StoreRole::Outbound,
                available: 6,
                requested: 7,
            })
        );
        // Failed attempts leave the buffer unchanged.
        assert_eq!(buf.len(), 6);
    }

    #[test]
    #[should_panic(expected = "not enough capacity in outbound store: 60 + 5 > 64")]
    fn test_segment_over_capacity_aborts() {
        let mut buf = buffer(64);
        buf.new_segment(60);
        buf.new_segment(5);
    }

    #[test]
    #[should_panic(expected = "stack imbalance in outbound store")]
    fn test_truncate_underflow_aborts() {
        let mut buf = buffer(64);
        buf.new_segment(3);
        buf.truncate(4);
    }
}
