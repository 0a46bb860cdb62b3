use std::fmt;

use crate::error::{Result, StreamError};

/// Default capacity of every stream window: 64 KB.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Bits of a virtual offset holding the intra-member decompressed offset.
pub const OFFSET_BITS: u32 = 16;

/// Largest compressed byte offset a virtual offset can address (48 bits).
pub const MAX_BLOCK_POSITION: u64 = (1 << (64 - OFFSET_BITS)) - 1;

/// Size of a serialized virtual offset in bytes.
pub const VIRTUAL_OFFSET_SIZE: usize = 8;

/// A position inside a block-indexed compressed file.
///
/// ```text
///  63                                16 15              0
/// ┌────────────────────────────────────┬────────────────┐
/// │ compressed offset of member start   │ offset inside  │
/// │ (bytes from start of file)          │ decompressed   │
/// └────────────────────────────────────┴────────────────┘
/// ```
///
/// This is the layout BAI/CSI/TBI indexes store, so offsets obtained from
/// [`Reader::virtual_position`](crate::Reader::virtual_position) can be
/// exchanged with external indexes of the same file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Compose a virtual offset, rejecting block positions beyond 48 bits.
    pub fn new(block_position: u64, offset: u16) -> Result<Self> {
        if block_position > MAX_BLOCK_POSITION {
            return Err(StreamError::InvalidOffset { block_position, offset: offset as u64 });
        }
        Ok(Self((block_position << OFFSET_BITS) | offset as u64))
    }

    /// Compose from an unchecked intra-member offset, as tracked by the
    /// stream loops.
    pub fn from_parts(block_position: u64, offset: u64) -> Result<Self> {
        let narrow = u16::try_from(offset)
            .map_err(|_| StreamError::InvalidOffset { block_position, offset })?;
        Self::new(block_position, narrow)
    }

    /// Compressed byte offset where the member begins.
    #[inline]
    pub fn block_position(self) -> u64 {
        self.0 >> OFFSET_BITS
    }

    /// Offset of the addressed byte within the member's decompressed payload.
    #[inline]
    pub fn offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Serialize as little-endian, the byte order index files use.
    pub fn to_le_bytes(self) -> [u8; VIRTUAL_OFFSET_SIZE] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(buf: [u8; VIRTUAL_OFFSET_SIZE]) -> Self {
        Self(u64::from_le_bytes(buf))
    }
}

impl From<u64> for VirtualOffset {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(voff: VirtualOffset) -> Self {
        voff.0
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_position(), self.offset())
    }
}
