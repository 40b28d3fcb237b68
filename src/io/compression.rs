//! BGZF block codec: random-access reading and append-only writing
//!
//! A BGZF container is a concatenation of independent gzip members, so the
//! whole file is still a valid gzip stream while every member can be inflated
//! on its own. Each member is addressed by the compressed byte offset it
//! starts at, which is what the high 48 bits of a [`VirtualOffset`] hold.
//!
//! # Block Structure
//!
//! Each bgzip block:
//! - Bytes 0-1: Gzip magic (31, 139)
//! - Byte 2: CM = 8 (deflate)
//! - Byte 3: FLG, FEXTRA (0x04) must be set
//! - Bytes 4-9: MTIME, XFL, OS
//! - Bytes 10-11: XLEN (extra field length)
//! - Bytes 12+: Extra subfields, including BSIZE
//!   - SI1=66 ('B'), SI2=67 ('C')
//!   - SLEN=2 (2-byte BSIZE field)
//!   - BSIZE (little-endian u16): total block size - 1
//! - Deflate payload, then CRC32 and ISIZE (4 bytes each)
//!
//! # Example
//!
//! ```
//! use biotabix::io::{BgzfReader, BgzfWriter};
//! use std::io::{Cursor, Write};
//!
//! # fn main() -> biotabix::Result<()> {
//! let mut writer = BgzfWriter::new(Vec::new());
//! writer.write_all(b"chr1\t100\t200\n")?;
//! let container = writer.finish()?;
//!
//! let mut reader = BgzfReader::new(Cursor::new(container));
//! let block = reader.read_block_at(0)?.expect("one data block");
//! assert_eq!(block.data(), b"chr1\t100\t200\n");
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TabixError};
use crate::io::VirtualOffset;
use flate2::read::GzDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Upper bound on a block's decompressed payload (and on its compressed size).
pub const BGZF_MAX_BLOCK_SIZE: usize = 64 * 1024;

/// Uncompressed bytes buffered per block by [`BgzfWriter`].
///
/// Kept below [`BGZF_MAX_BLOCK_SIZE`] so that an incompressible payload plus
/// header and trailer still fits the 16-bit BSIZE field.
pub const BGZF_BLOCK_SIZE: usize = 0xff00;

/// Standard 28-byte empty block that terminates a BGZF stream.
pub const BGZF_EOF: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, // Header (10 bytes)
    6, 0, 66, 67, 2, 0, 27, 0, // Extra field with BSIZE=27 (8 bytes)
    3, 0, // Empty deflate block (2 bytes)
    0, 0, 0, 0, // CRC32 (4 bytes)
    0, 0, 0, 0, // ISIZE=0 (4 bytes)
];

/// Fixed gzip header up to and including XLEN
const GZIP_FIXED_HEADER: usize = 12;

/// CRC32 + ISIZE
const GZIP_TRAILER: usize = 8;

/// FEXTRA bit of the gzip FLG byte
const FLAG_FEXTRA: u8 = 0x04;

/// One decompressed BGZF member together with its placement in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    offset: u64,
    compressed_len: usize,
    data: Vec<u8>,
}

impl Block {
    /// Compressed byte offset where the block starts
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// On-disk size of the block (header + payload + trailer)
    pub fn compressed_len(&self) -> usize {
        self.compressed_len
    }

    /// Offset of the block that follows this one
    pub fn next_offset(&self) -> u64 {
        self.offset + self.compressed_len as u64
    }

    /// Decompressed payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the block and return its payload
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// True for blocks with no payload, such as the EOF marker
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Virtual offset of byte `pos` within this block's payload
    pub fn virtual_offset(&self, pos: usize) -> VirtualOffset {
        VirtualOffset::new(self.offset, pos as u16)
    }
}

/// Random-access BGZF block reader.
///
/// Blocks are read on demand and never cached; the reader only remembers the
/// file cursor so that sequential reads skip the seek.
pub struct BgzfReader<R> {
    inner: R,
    /// Current position of `inner`, if known
    position: Option<u64>,
    /// Source file, named in format errors
    path: Option<PathBuf>,
}

impl BgzfReader<BufReader<File>> {
    /// Open a BGZF container from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = Self::new(BufReader::new(file));
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Wrap a seekable byte source
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: None,
            path: None,
        }
    }

    /// Get a reference to the underlying reader
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the reader, returning the underlying byte source
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read and inflate the block starting at compressed offset `offset`.
    ///
    /// Returns `Ok(None)` when `offset` is at or past end of file.
    ///
    /// # Errors
    ///
    /// [`TabixError::InvalidBgzf`] for a bad magic, an absent BC subfield,
    /// a truncated member or a payload that fails to inflate or checksum.
    pub fn read_block_at(&mut self, offset: u64) -> Result<Option<Block>> {
        if self.position != Some(offset) {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.position = Some(offset);
        }
        self.read_block(offset).map_err(|e| {
            self.position = None;
            match e {
                TabixError::InvalidBgzf { path: None, offset, msg } => TabixError::InvalidBgzf {
                    path: self.path.clone(),
                    offset,
                    msg,
                },
                other => other,
            }
        })
    }

    fn read_block(&mut self, offset: u64) -> Result<Option<Block>> {
        let mut header = [0u8; GZIP_FIXED_HEADER];
        let n = read_up_to(&mut self.inner, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        self.advance(n);
        if n < GZIP_FIXED_HEADER {
            return Err(TabixError::bgzf(
                offset,
                format!("Truncated header ({} of {} bytes)", n, GZIP_FIXED_HEADER),
            ));
        }

        if header[0] != 31 || header[1] != 139 {
            return Err(TabixError::bgzf(
                offset,
                format!(
                    "Invalid gzip magic bytes: expected [31, 139], got [{}, {}]",
                    header[0], header[1]
                ),
            ));
        }
        if header[2] != 8 {
            return Err(TabixError::bgzf(
                offset,
                format!("Unsupported compression method {}", header[2]),
            ));
        }
        if header[3] & FLAG_FEXTRA == 0 {
            return Err(TabixError::bgzf(
                offset,
                "No extra field; not a BGZF block",
            ));
        }

        let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
        let mut extra = vec![0u8; xlen];
        self.read_exact_at(offset, &mut extra, "extra field")?;

        let bsize = find_bsize(&extra)
            .ok_or_else(|| TabixError::bgzf(offset, "Missing BC subfield"))?;
        let block_size = bsize as usize + 1;

        let already_read = GZIP_FIXED_HEADER + xlen;
        if block_size < already_read + GZIP_TRAILER {
            return Err(TabixError::bgzf(
                offset,
                format!("Invalid block size: {} < {}", block_size, already_read + GZIP_TRAILER),
            ));
        }

        let mut raw = Vec::with_capacity(block_size);
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&extra);
        raw.resize(block_size, 0);
        self.read_exact_at(offset, &mut raw[already_read..], "payload")?;

        let data = inflate_member(&raw).map_err(|e| {
            TabixError::bgzf(offset, format!("Failed to inflate block: {}", e))
        })?;
        if data.len() > BGZF_MAX_BLOCK_SIZE {
            return Err(TabixError::bgzf(
                offset,
                format!("Block inflates to {} bytes (max {})", data.len(), BGZF_MAX_BLOCK_SIZE),
            ));
        }

        Ok(Some(Block {
            offset,
            compressed_len: block_size,
            data,
        }))
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8], what: &str) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.advance(buf.len());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(TabixError::bgzf(
                offset,
                format!("Truncated {}", what),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn advance(&mut self, n: usize) {
        self.position = self.position.map(|p| p + n as u64);
    }

    /// Iterate over every block from the start of the container
    pub fn blocks(&mut self) -> Blocks<'_, R> {
        Blocks {
            reader: self,
            next: Some(0),
        }
    }

    /// Inflate the bytes between two virtual offsets.
    ///
    /// Every block from `start`'s block through `end`'s block is read; the
    /// first is trimmed to begin at `start`'s inner offset and the last to
    /// stop at `end`'s inner offset.
    pub fn read_span(&mut self, start: VirtualOffset, end: VirtualOffset) -> Result<Vec<u8>> {
        if end < start {
            return Err(TabixError::InvalidRange(format!(
                "span end {} precedes start {}",
                end, start
            )));
        }

        let mut out = Vec::new();
        let mut offset = start.compressed_offset();
        loop {
            let block = match self.read_block_at(offset)? {
                Some(block) => block,
                None => break,
            };
            let is_first = block.offset() == start.compressed_offset();
            let is_last = block.offset() >= end.compressed_offset();

            let from = if is_first {
                usize::from(start.uncompressed_offset())
            } else {
                0
            };
            let to = if is_last {
                usize::from(end.uncompressed_offset())
            } else {
                block.data().len()
            };
            if from > block.data().len() || to > block.data().len() {
                return Err(TabixError::bgzf(
                    block.offset(),
                    format!(
                        "Inner offset {} beyond block payload of {} bytes",
                        from.max(to),
                        block.data().len()
                    ),
                ));
            }
            if from < to {
                out.extend_from_slice(&block.data()[from..to]);
            }

            if is_last {
                break;
            }
            offset = block.next_offset();
        }

        Ok(out)
    }
}

/// Sequential iterator over the blocks of a container
pub struct Blocks<'a, R> {
    reader: &'a mut BgzfReader<R>,
    next: Option<u64>,
}

impl<R: Read + Seek> Iterator for Blocks<'_, R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;
        match self.reader.read_block_at(offset) {
            Ok(Some(block)) => {
                self.next = Some(block.next_offset());
                Some(Ok(block))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Locate the BC subfield in a gzip extra field and return its BSIZE
fn find_bsize(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let si1 = extra[pos];
        let si2 = extra[pos + 1];
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;

        if si1 == 66 && si2 == 67 && slen == 2 && pos + 6 <= extra.len() {
            return Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]));
        }

        pos += 4 + slen;
    }
    None
}

/// Inflate one complete gzip member, checking its CRC32 and ISIZE
fn inflate_member(raw: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(raw);
    let mut decompressed = Vec::with_capacity(BGZF_MAX_BLOCK_SIZE);
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Read until `buf` is full or the source is exhausted
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Compress one payload (at most [`BGZF_BLOCK_SIZE`] bytes) into a complete BGZF block
///
/// Standard gzip header (10 bytes):
/// - ID1=31, ID2=139 (gzip magic)
/// - CM=8 (deflate)
/// - FLG=4 (FEXTRA flag set)
/// - MTIME=0 (no timestamp)
/// - XFL=0 (default compression)
/// - OS=255 (unknown)
/// - XLEN=6 (extra field length)
///
/// Extra field (8 bytes): SI1='B', SI2='C', SLEN=2, BSIZE
///
/// Compressed data + CRC32 + ISIZE
pub fn compress_block(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut deflate = DeflateEncoder::new(Vec::new(), level);
    deflate.write_all(data)?;
    let deflated = deflate.finish()?;

    let crc = crc32fast::hash(data);
    let isize = data.len() as u32;

    let total_size = 18 + deflated.len() + GZIP_TRAILER;
    if total_size > BGZF_MAX_BLOCK_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Compressed block of {} bytes exceeds BGZF limit", total_size),
        ));
    }

    let mut block = Vec::with_capacity(total_size);
    block.extend_from_slice(&[31, 139, 8, FLAG_FEXTRA, 0, 0, 0, 0, 0, 255]);
    block.extend_from_slice(&6u16.to_le_bytes()); // XLEN=6
    block.extend_from_slice(&[66, 67]); // SI1='B', SI2='C'
    block.extend_from_slice(&2u16.to_le_bytes()); // SLEN=2
    block.extend_from_slice(&((total_size - 1) as u16).to_le_bytes());
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc.to_le_bytes());
    block.extend_from_slice(&isize.to_le_bytes());

    Ok(block)
}

/// Append-only BGZF writer.
///
/// Bytes are buffered until [`BGZF_BLOCK_SIZE`] accumulate (or `flush` is
/// called), then emitted as one complete gzip member. [`finish`](Self::finish)
/// writes any remainder followed by the [`BGZF_EOF`] marker.
///
/// # Example
///
/// ```
/// use biotabix::io::BgzfWriter;
/// use std::io::Write;
///
/// # fn main() -> std::io::Result<()> {
/// let mut writer = BgzfWriter::new(Vec::new());
/// writer.write_all(b"chr1\t1\t2\n")?;
/// let start = writer.virtual_position();
/// writer.write_all(b"chr1\t5\t9\n")?;
/// assert_eq!(start.uncompressed_offset(), 9);
/// let bytes = writer.finish()?;
/// assert!(bytes.ends_with(&biotabix::io::BGZF_EOF));
/// # Ok(())
/// # }
/// ```
pub struct BgzfWriter<W: Write> {
    inner: Option<W>,
    buffer: Vec<u8>,
    level: Compression,
    /// Compressed bytes already handed to `inner`
    compressed_offset: u64,
}

impl BgzfWriter<File> {
    /// Create a file and write BGZF into it
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> BgzfWriter<W> {
    /// Create a writer with the default compression level
    pub fn new(inner: W) -> Self {
        Self::with_compression(inner, Compression::default())
    }

    /// Create a writer with an explicit compression level
    pub fn with_compression(inner: W, level: Compression) -> Self {
        Self {
            inner: Some(inner),
            buffer: Vec::with_capacity(BGZF_BLOCK_SIZE),
            level,
            compressed_offset: 0,
        }
    }

    /// Virtual offset the next written byte will occupy
    pub fn virtual_position(&self) -> VirtualOffset {
        VirtualOffset::new(self.compressed_offset, self.buffer.len() as u16)
    }

    fn write_block(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let inner = self.inner.as_mut().ok_or_else(finished_error)?;
        let block = compress_block(&self.buffer, self.level)?;
        inner.write_all(&block)?;
        self.compressed_offset += block.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Flush buffered data, write the EOF marker and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        self.write_block()?;
        let mut inner = self.inner.take().ok_or_else(finished_error)?;
        inner.write_all(&BGZF_EOF)?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            return Err(finished_error());
        }

        let mut remaining = buf;
        while !remaining.is_empty() {
            let space_in_block = BGZF_BLOCK_SIZE - self.buffer.len();
            let to_copy = remaining.len().min(space_in_block);

            self.buffer.extend_from_slice(&remaining[..to_copy]);
            remaining = &remaining[to_copy..];

            if self.buffer.len() >= BGZF_BLOCK_SIZE {
                self.write_block()?;
            }
        }

        Ok(buf.len())
    }

    /// Emit the buffered bytes as a block (a block boundary) and flush `inner`
    fn flush(&mut self) -> io::Result<()> {
        self.write_block()?;
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for BgzfWriter<W> {
    fn drop(&mut self) {
        // Best-effort; call finish() to observe errors
        if self.inner.is_some() {
            let _ = self.write_block();
            if let Some(inner) = self.inner.as_mut() {
                let _ = inner.write_all(&BGZF_EOF);
                let _ = inner.flush();
            }
        }
    }
}

fn finished_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "Cannot write to finished writer")
}
