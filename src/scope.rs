//! The request scope: everything bound to one in-flight request.

use crate::arena::{BumpAllocator, SegmentedBuffer};
use crate::error::{Error, InvariantViolation, Result};
use crate::memory::BackingStore;
use crate::observability::{PoolMetrics, trace_reply};
use crate::wire::{IN_HEADER_LEN, InHeader, OUT_HEADER_LEN, OutHeaderMut};
use std::io::{ErrorKind, Read, Write};

/// Where a scope is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    /// Freshly reset; no request bytes yet.
    Idle,
    /// A request has been committed to the inbound store.
    Populated,
    /// Scratch or reply memory is in use.
    Responding,
    /// The reply has been finished.
    Responded,
}

/// Per-request state that survives between resets, owned by the pool.
pub(crate) struct ScopeState<C, R> {
    /// Bytes of the committed request.
    pub(crate) request_len: usize,
    /// Inbound prefix that may hold request bytes and must be zeroed.
    pub(crate) dirty: usize,
    pub(crate) responded: bool,
    pub(crate) connection: Option<C>,
    pub(crate) request: Option<R>,
}

impl<C, R> ScopeState<C, R> {
    pub(crate) fn new() -> Self {
        Self {
            request_len: 0,
            dirty: 0,
            responded: false,
            connection: None,
            request: None,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.request_len = 0;
        self.dirty = 0;
        self.responded = false;
        self.connection = None;
        self.request = None;
    }
}

/// Memory and state for exactly one in-flight request.
///
/// Obtained from [`BufferPool::reset`](crate::BufferPool::reset). The scope
/// borrows the pool mutably, so at most one exists per pool and none can be
/// held across the next reset.
///
/// # Cycle
///
/// ```text
/// reset ─▶ Idle ─(commit/read request)─▶ Populated ─(alloc/new_segment)─▶ Responding
///                                                                            │
///          reset ◀──────────────────(write_response)◀── Responded ◀─(finish_reply)
/// ```
pub struct RequestScope<'pool, C = (), R = ()> {
    pub(crate) inbound: &'pool mut BackingStore,
    pub(crate) response: &'pool mut SegmentedBuffer,
    pub(crate) request_view: &'pool mut SegmentedBuffer,
    pub(crate) response_view: &'pool mut SegmentedBuffer,
    pub(crate) allocator: &'pool mut BumpAllocator,
    pub(crate) state: &'pool mut ScopeState<C, R>,
    pub(crate) metrics: &'pool PoolMetrics,
}

impl<'pool, C, R> RequestScope<'pool, C, R> {
    // ========================================================================
    // Inbound
    // ========================================================================

    /// The whole inbound store, for an external reader to fill.
    ///
    /// Until [`commit_request`](Self::commit_request) narrows it, the whole
    /// store is considered dirty and the next reset clears all of it.
    pub fn inbound_mut(&mut self) -> &mut [u8] {
        self.state.dirty = self.inbound.capacity();
        self.inbound.bytes_mut()
    }

    /// Record that the first `len` inbound bytes hold the request.
    ///
    /// `len` must be the exact number of bytes the reader wrote: the next
    /// reset zeroes only that prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestTooLarge`] if `len` exceeds the store.
    pub fn commit_request(&mut self, len: usize) -> Result<()> {
        let capacity = self.inbound.capacity();
        if len > capacity {
            return Err(Error::RequestTooLarge { len, capacity });
        }
        self.state.request_len = len;
        self.state.dirty = len;
        Ok(())
    }

    /// Fill the inbound store with a single read and commit what arrived.
    ///
    /// The kernel device delivers one whole message per read; interrupted
    /// reads are retried.
    pub fn read_request<T: Read + ?Sized>(&mut self, reader: &mut T) -> Result<usize> {
        let n = loop {
            match reader.read(self.inbound_mut()) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        self.commit_request(n)?;
        Ok(n)
    }

    /// The committed request bytes.
    pub fn request_bytes(&self) -> &[u8] {
        &self.inbound.bytes()[..self.state.request_len]
    }

    /// Typed view over the request header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortHeader`] if the committed request is shorter
    /// than a header.
    pub fn header(&self) -> Result<InHeader<'_>> {
        InHeader::new(self.request_bytes())
    }

    /// Request bytes following the header (empty if there are none).
    pub fn payload(&self) -> &[u8] {
        let bytes = self.request_bytes();
        &bytes[IN_HEADER_LEN.min(bytes.len())..]
    }

    // ========================================================================
    // Scratch and staging
    // ========================================================================

    /// Scratch allocator for this request.
    pub fn allocator(&self) -> &BumpAllocator {
        &*self.allocator
    }

    /// Scratch allocator, for releasing memory.
    pub fn allocator_mut(&mut self) -> &mut BumpAllocator {
        &mut *self.allocator
    }

    /// Decoder-side staging buffer.
    pub fn request_view(&mut self) -> &mut SegmentedBuffer {
        &mut *self.request_view
    }

    /// Handler-side staging buffer for reply bodies.
    pub fn response_view(&mut self) -> &mut SegmentedBuffer {
        &mut *self.response_view
    }

    // ========================================================================
    // Reply
    // ========================================================================

    /// Outbound reply buffer.
    pub fn response(&mut self) -> &mut SegmentedBuffer {
        &mut *self.response
    }

    /// Reply bytes written so far, as the writer will flush them.
    pub fn response_bytes(&self) -> &[u8] {
        self.response.as_bytes()
    }

    /// Start a reply to request `unique`.
    ///
    /// Discards anything already in the reply buffer, then writes a zeroed
    /// reply header with `unique` set. Body segments follow with
    /// [`response`](Self::response).
    #[track_caller]
    pub fn begin_reply(&mut self, unique: u64) -> OutHeaderMut<'_> {
        let written = self.response.len();
        self.response.truncate(written);
        let mut header = OutHeaderMut::over(self.response.new_segment(OUT_HEADER_LEN));
        header.set_unique(unique);
        header
    }

    /// Discard any partial reply and answer with `errno`.
    ///
    /// The header carries the negated errno, as the kernel expects. The sign
    /// of `errno` is ignored; `i32::MIN` is passed through unchanged.
    #[track_caller]
    pub fn reply_error(&mut self, unique: u64, errno: i32) -> Result<&[u8]> {
        let error = errno.checked_abs().map_or(i32::MIN, |e| -e);
        self.begin_reply(unique).set_error(error);
        self.finish_reply()
    }

    /// Patch the reply length, mark the scope responded, and return the
    /// bytes to flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortHeader`] if no reply header was written, or
    /// [`Error::ReplyTooLarge`] if the length does not fit the header field.
    ///
    /// # Panics
    ///
    /// Aborts if the request was already answered.
    #[track_caller]
    pub fn finish_reply(&mut self) -> Result<&[u8]> {
        let len = self.response.len();
        let wire_len = u32::try_from(len).map_err(|_| Error::ReplyTooLarge { len })?;
        let mut header = OutHeaderMut::new(self.response.as_bytes_mut())?;
        header.set_len(wire_len);
        let (unique, error) = (header.unique(), header.error());

        self.mark_responded();
        self.metrics.record_response(len);
        trace_reply(unique, error, len);
        Ok(self.response.as_bytes())
    }

    /// Flush the reply with exactly one write.
    ///
    /// # Errors
    ///
    /// A short write is reported as [`ErrorKind::WriteZero`]; interrupted
    /// writes are retried.
    pub fn write_response<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        let bytes = self.response.as_bytes();
        let n = loop {
            match writer.write(bytes) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n != bytes.len() {
            return Err(std::io::Error::new(
                ErrorKind::WriteZero,
                format!("short reply write: {n} of {} bytes", bytes.len()),
            )
            .into());
        }
        Ok(n)
    }

    /// Whether the request has been answered.
    pub fn responded(&self) -> bool {
        self.state.responded
    }

    /// Mark the request answered, or report that it already was.
    pub fn try_mark_responded(&mut self) -> std::result::Result<(), InvariantViolation> {
        if self.state.responded {
            return Err(InvariantViolation::DoubleResponse);
        }
        self.state.responded = true;
        Ok(())
    }

    /// Mark the request answered.
    ///
    /// # Panics
    ///
    /// Aborts if it already was.
    #[track_caller]
    pub fn mark_responded(&mut self) {
        if let Err(violation) = self.try_mark_responded() {
            violation.abort();
        }
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Attach the owning connection.
    pub fn bind_connection(&mut self, connection: C) {
        self.state.connection = Some(connection);
    }

    /// Owning connection, if bound.
    pub fn connection(&self) -> Option<&C> {
        self.state.connection.as_ref()
    }

    /// Attach the decoded request.
    pub fn bind_request(&mut self, request: R) {
        self.state.request = Some(request);
    }

    /// Decoded request, if bound.
    pub fn request(&self) -> Option<&R> {
        self.state.request.as_ref()
    }

    /// Current phase of the cycle.
    pub fn phase(&self) -> ScopePhase {
        if self.state.responded {
            ScopePhase::Responded
        } else if !self.response.is_empty() || self.allocator.high_water() > 0 {
            ScopePhase::Responding
        } else if self.state.request_len > 0 {
            ScopePhase::Populated
        } else {
            ScopePhase::Idle
        }
    }

    /// Capacity shared by every store.
    pub fn capacity(&self) -> usize {
        self.inbound.capacity()
    }
}

impl<C, R> std::fmt::Debug for RequestScope<'_, C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("phase", &self.phase())
            .field("request_len", &self.state.request_len)
            .field("response_len", &self.response.len())
            .field("scratch", &self.allocator.offset())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::memory::Backing;
    use crate::pool::BufferPool;
    use std::io::Cursor;

    fn pool() -> BufferPool<u32, &'static str> {
        BufferPool::new(PoolConfig::new(4096, 4096).with_backing(Backing::Heap)).unwrap()
    }

    fn request(unique: u64, opcode: u32, payload: &[u8]) -> Vec<u8> {
        let len = (IN_HEADER_LEN + payload.len()) as u32;
        let mut bytes = vec![0u8; IN_HEADER_LEN];
        bytes[0..4].copy_from_slice(&len.to_ne_bytes());
        bytes[4..8].copy_from_slice(&opcode.to_ne_bytes());
        bytes[8..16].copy_from_slice(&unique.to_ne_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Writer that accepts at most `limit` bytes per call.
    struct ShortWriter {
        limit: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len().min(self.limit))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_phases() {
        let mut pool = pool();
        let mut scope = pool.reset();
        assert_eq!(scope.phase(), ScopePhase::Idle);

        scope
            .read_request(&mut Cursor::new(request(1, 3, b"")))
            .unwrap();
        assert_eq!(scope.phase(), ScopePhase::Populated);

        scope.begin_reply(1);
        assert_eq!(scope.phase(), ScopePhase::Responding);

        scope.finish_reply().unwrap();
        assert_eq!(scope.phase(), ScopePhase::Responded);
    }

    #[test]
    fn test_read_request_and_header() {
        let mut pool = pool();
        let mut scope = pool.reset();

        let n = scope
            .read_request(&mut Cursor::new(request(77, 16, b"abc")))
            .unwrap();
        assert_eq!(n, IN_HEADER_LEN + 3);

        let header = scope.header().unwrap();
        assert_eq!(header.unique(), 77);
        assert_eq!(header.opcode(), 16);
        assert_eq!(header.len() as usize, n);
        assert_eq!(scope.payload(), b"abc");
    }

    #[test]
    fn test_short_request_header() {
        let mut pool = pool();
        let mut scope = pool.reset();
        scope.inbound_mut()[..8].fill(1);
        scope.commit_request(8).unwrap();

        assert!(matches!(
            scope.header(),
            Err(Error::ShortHeader { available: 8, .. })
        ));
        assert_eq!(scope.payload(), b"");
    }

    #[test]
    fn test_commit_too_large() {
        let mut pool = pool();
        let mut scope = pool.reset();
        let capacity = scope.capacity();
        assert!(matches!(
            scope.commit_request(capacity + 1),
            Err(Error::RequestTooLarge { .. })
        ));
    }

    #[test]
    fn test_reply_with_body() {
        let mut pool = pool();
        let mut scope = pool.reset();
        scope
            .read_request(&mut Cursor::new(request(9, 15, b"")))
            .unwrap();

        scope.begin_reply(9);
        scope.response().append(b"data");
        let bytes = scope.finish_reply().unwrap().to_vec();

        assert_eq!(bytes.len(), OUT_HEADER_LEN + 4);
        assert_eq!(&bytes[0..4], &((OUT_HEADER_LEN + 4) as u32).to_ne_bytes());
        assert_eq!(&bytes[4..8], &0i32.to_ne_bytes());
        assert_eq!(&bytes[8..16], &9u64.to_ne_bytes());
        assert_eq!(&bytes[16..], b"data");

        let mut sink = Vec::new();
        assert_eq!(scope.write_response(&mut sink).unwrap(), bytes.len());
        assert_eq!(sink, bytes);
    }

    #[test]
    fn test_reply_error_discards_partial_body() {
        let mut pool = pool();
        let mut scope = pool.reset();

        scope.begin_reply(5);
        scope.response().append(&[0xCC; 100]);
        let bytes = scope.reply_error(5, 2).unwrap();

        assert_eq!(bytes.len(), OUT_HEADER_LEN);
        assert_eq!(&bytes[4..8], &(-2i32).to_ne_bytes());
        assert!(scope.responded());
    }

    #[test]
    fn test_finish_without_header() {
        let mut pool = pool();
        let mut scope = pool.reset();
        scope.response().new_segment(4);
        assert!(matches!(
            scope.finish_reply(),
            Err(Error::ShortHeader { .. })
        ));
        assert!(!scope.responded());
    }

    #[test]
    fn test_short_write_is_error() {
        let mut pool = pool();
        let mut scope = pool.reset();
        scope.reply_error(1, 5).unwrap();

        let err = scope
            .write_response(&mut ShortWriter { limit: 4 })
            .unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == ErrorKind::WriteZero));
    }

    #[test]
    fn test_try_mark_responded_twice() {
        let mut pool = pool();
        let mut scope = pool.reset();
        assert_eq!(scope.try_mark_responded(), Ok(()));
        assert_eq!(
            scope.try_mark_responded(),
            Err(InvariantViolation::DoubleResponse)
        );
    }

    #[test]
    #[should_panic(expected = "request already responded")]
    fn test_double_reply_aborts() {
        let mut pool = pool();
        let mut scope = pool.reset();
        scope.reply_error(1, 2).unwrap();
        let _ = scope.reply_error(1, 2);
    }

    #[test]
    fn test_bindings() {
        let mut pool = pool();
        let mut scope = pool.reset();
        assert!(scope.connection().is_none());
        assert!(scope.request().is_none());

        scope.bind_connection(3);
        scope.bind_request("lookup");
        assert_eq!(scope.connection(), Some(&3));
        assert_eq!(scope.request(), Some(&"lookup"));
    }

    #[test]
    fn test_reply_error_extreme_errno() {
        let mut pool = pool();
        let mut scope = pool.reset();
        let bytes = scope.reply_error(3, i32::MIN).unwrap();
        assert_eq!(&bytes[4..8], &i32::MIN.to_ne_bytes());

        let mut scope = pool.reset();
        let bytes = scope.reply_error(4, -13).unwrap();
        assert_eq!(&bytes[4..8], &(-13i32).to_ne_bytes());
    }

    #[test]
    fn test_scratch_and_views() {
        let mut pool = pool();
        let mut scope = pool.reset();

        let a = scope.allocator().alloc(8);
        let b = scope.allocator().alloc(16);
        a.fill(1);
        b.fill(2);
        scope.allocator_mut().free(16);
        assert_eq!(scope.allocator().offset(), 8);

        scope.request_view().append(b"name\0");
        scope.response_view().new_segment(32);
        assert_eq!(scope.request_view().len(), 5);
        assert_eq!(scope.response_view().len(), 32);
    }
}
