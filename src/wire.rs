//! Typed views over the fixed-size protocol headers.
//!
//! The kernel lays headers out in host byte order. These views read and
//! write each field at its fixed offset with explicit native-endian
//! conversions, after a single bounds check at construction.
//!
//! ```text
//! request header (40 bytes)
//! ┌─────┬────────┬────────┬────────┬─────┬─────┬─────┬─────────┐
//! │ len │ opcode │ unique │ nodeid │ uid │ gid │ pid │ padding │
//! │ u32 │  u32   │  u64   │  u64   │ u32 │ u32 │ u32 │   u32   │
//! └─────┴────────┴────────┴────────┴─────┴─────┴─────┴─────────┘
//!
//! reply header (16 bytes)
//! ┌─────┬───────┬────────┐
//! │ len │ error │ unique │
//! │ u32 │  i32  │  u64   │
//! └─────┴───────┴────────┘
//! ```

use crate::error::{Error, Result};

/// Size of the request header.
pub const IN_HEADER_LEN: usize = 40;

/// Size of the reply header.
pub const OUT_HEADER_LEN: usize = 16;

#[inline]
fn get<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut field = [0u8; N];
    field.copy_from_slice(&bytes[offset..offset + N]);
    field
}

/// Read-only view of a request header at the start of the inbound bytes.
#[derive(Clone, Copy)]
pub struct InHeader<'a> {
    bytes: &'a [u8],
}

impl<'a> InHeader<'a> {
    const LEN: usize = 0;
    const OPCODE: usize = 4;
    const UNIQUE: usize = 8;
    const NODE_ID: usize = 16;
    const UID: usize = 24;
    const GID: usize = 28;
    const PID: usize = 32;

    /// Overlay the header on the first [`IN_HEADER_LEN`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortHeader`] if fewer bytes are present.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < IN_HEADER_LEN {
            return Err(Error::ShortHeader {
                needed: IN_HEADER_LEN,
                available: bytes.len(),
            });
        }
        Ok(Self {
            bytes: &bytes[..IN_HEADER_LEN],
        })
    }

    /// Total message length, header included.
    pub fn len(&self) -> u32 {
        u32::from_ne_bytes(get(self.bytes, Self::LEN))
    }

    /// True if the message claims zero length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operation code.
    pub fn opcode(&self) -> u32 {
        u32::from_ne_bytes(get(self.bytes, Self::OPCODE))
    }

    /// Request identifier echoed in the reply.
    pub fn unique(&self) -> u64 {
        u64::from_ne_bytes(get(self.bytes, Self::UNIQUE))
    }

    /// Target inode.
    pub fn node_id(&self) -> u64 {
        u64::from_ne_bytes(get(self.bytes, Self::NODE_ID))
    }

    /// Caller user id.
    pub fn uid(&self) -> u32 {
        u32::from_ne_bytes(get(self.bytes, Self::UID))
    }

    /// Caller group id.
    pub fn gid(&self) -> u32 {
        u32::from_ne_bytes(get(self.bytes, Self::GID))
    }

    /// Caller process id.
    pub fn pid(&self) -> u32 {
        u32::from_ne_bytes(get(self.bytes, Self::PID))
    }
}

impl std::fmt::Debug for InHeader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InHeader")
            .field("len", &self.len())
            .field("opcode", &self.opcode())
            .field("unique", &self.unique())
            .field("node_id", &self.node_id())
            .field("uid", &self.uid())
            .field("gid", &self.gid())
            .field("pid", &self.pid())
            .finish()
    }
}

/// Writable view of a reply header inside the outbound buffer.
pub struct OutHeaderMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> OutHeaderMut<'a> {
    const LEN: usize = 0;
    const ERROR: usize = 4;
    const UNIQUE: usize = 8;

    /// Overlay the header on the first [`OUT_HEADER_LEN`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortHeader`] if fewer bytes are present.
    pub fn new(bytes: &'a mut [u8]) -> Result<Self> {
        if bytes.len() < OUT_HEADER_LEN {
            return Err(Error::ShortHeader {
                needed: OUT_HEADER_LEN,
                available: bytes.len(),
            });
        }
        Ok(Self {
            bytes: &mut bytes[..OUT_HEADER_LEN],
        })
    }

    /// Overlay on a segment known to be exactly header-sized.
    pub(crate) fn over(bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len(), OUT_HEADER_LEN);
        Self { bytes }
    }

    /// Total reply length, header included.
    pub fn len(&self) -> u32 {
        u32::from_ne_bytes(get(self.bytes, Self::LEN))
    }

    /// True if no length has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Negated errno, or 0 on success.
    pub fn error(&self) -> i32 {
        i32::from_ne_bytes(get(self.bytes, Self::ERROR))
    }

    /// Request identifier being answered.
    pub fn unique(&self) -> u64 {
        u64::from_ne_bytes(get(self.bytes, Self::UNIQUE))
    }

    /// Set the total reply length.
    pub fn set_len(&mut self, len: u32) -> &mut Self {
        self.bytes[Self::LEN..Self::LEN + 4].copy_from_slice(&len.to_ne_bytes());
        self
    }

    /// Set the error field.
    pub fn set_error(&mut self, error: i32) -> &mut Self {
        self.bytes[Self::ERROR..Self::ERROR + 4].copy_from_slice(&error.to_ne_bytes());
        self
    }

    /// Set the request identifier.
    pub fn set_unique(&mut self, unique: u64) -> &mut Self {
        self.bytes[Self::UNIQUE..Self::UNIQUE + 8].copy_from_slice(&unique.to_ne_bytes());
        self
    }
}
