//! BGZF virtual file offsets and chunks.
//!
//! A virtual offset combines:
//! - **Compressed offset** (high 48 bits): byte position of a BGZF block in the container
//! - **Uncompressed offset** (low 16 bits): byte position inside that block's decompressed payload
//!
//! Both index formats address records this way, so a reader can seek straight
//! to the block holding a record without inflating anything before it.

use std::fmt;

/// Largest compressed offset representable in a virtual offset (48 bits).
pub const MAX_COMPRESSED_OFFSET: u64 = (1 << 48) - 1;

/// Virtual file offset in BGZF format.
///
/// Ordering is the numeric ordering of the packed value, which matches file
/// layout because blocks are contiguous and an inner offset never exceeds one
/// block's payload.
///
/// # Example
///
/// ```
/// # use biotabix::io::VirtualOffset;
/// let offset = VirtualOffset::new(1024, 512);
/// assert_eq!(offset.compressed_offset(), 1024);
/// assert_eq!(offset.uncompressed_offset(), 512);
/// assert_eq!(VirtualOffset::from_raw(offset.as_raw()), offset);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Create a virtual offset from its compressed and uncompressed components.
    ///
    /// Bits of `compressed` above 48 are discarded.
    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        VirtualOffset(((compressed & MAX_COMPRESSED_OFFSET) << 16) | u64::from(uncompressed))
    }

    /// Create from raw 64-bit value.
    pub fn from_raw(value: u64) -> Self {
        VirtualOffset(value)
    }

    /// Get raw 64-bit value.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Get compressed file offset (high 48 bits).
    pub fn compressed_offset(self) -> u64 {
        self.0 >> 16
    }

    /// Get uncompressed offset within block (low 16 bits).
    pub fn uncompressed_offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl From<u64> for VirtualOffset {
    fn from(value: u64) -> Self {
        VirtualOffset(value)
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed_offset(), self.uncompressed_offset())
    }
}

/// Half-open range `[start, end)` of virtual offsets.
///
/// A chunk spans exactly the bytes that must be inflated to see every record
/// an index bin points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Virtual file offset where chunk starts
    pub start: VirtualOffset,
    /// Virtual file offset where chunk ends (exclusive)
    pub end: VirtualOffset,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Chunk { start, end }
    }

    /// True if the chunk covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Sort chunks by start and merge the ones that overlap or touch.
pub(crate) fn merge_chunks(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    if chunks.is_empty() {
        return chunks;
    }

    chunks.sort_by_key(|c| c.start);

    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(current) if chunk.start <= current.end => {
                current.end = current.end.max(chunk.end);
            }
            _ => merged.push(chunk),
        }
    }

    merged
}
