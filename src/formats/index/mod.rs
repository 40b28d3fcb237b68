//! Index formats for BGZF-compressed text files
//!
//! Two binary layouts map genomic bins to chunks of the compressed file:
//!
//! - **TBI (Tabix)**: fixed 5-level binning with 16 Kbp tiles, plus a linear index
//! - **CSI**: binning depth and tile size chosen per file, per-bin `loffset`
//!
//! Both are exposed through the [`TabixIndex`] trait so region resolution
//! does not care which one is on disk. [`Index`] holds either and picks the
//! right parser from the file's magic bytes.
//!
//! # Example
//!
//! ```no_run
//! use biotabix::formats::index::{Index, TabixIndex};
//!
//! # fn main() -> biotabix::Result<()> {
//! let index = Index::from_path("variants.vcf.gz.tbi")?;
//! let chunks = index.query_chunks("chr1", 1_000_000, 2_000_000)?;
//! println!("Found {} chunks for region", chunks.len());
//! # Ok(())
//! # }
//! ```

pub mod binning;
pub mod columns;
pub mod csi;
pub mod reference;
pub mod tbi;

pub use binning::Binning;
pub use columns::{ColumnSpec, Preset, RecordInterval};
pub use csi::CsiIndex;
pub use reference::{Bin, ReferenceIndex, ReferenceStats};
pub use tbi::TbiIndex;

use crate::error::{Result, TabixError};
use crate::io::Chunk;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Index file extensions tried next to a data file, in order
pub const INDEX_EXTENSIONS: [&str; 2] = ["tbi", "csi"];

/// Common view of a tabix-style index
pub trait TabixIndex {
    /// Column layout of the indexed records
    fn columns(&self) -> &ColumnSpec;

    /// Binning parameters
    fn binning(&self) -> Binning;

    /// All reference sequences, in index order
    fn references(&self) -> &[ReferenceIndex];

    /// Position of a reference by name
    fn reference_id(&self, name: &str) -> Option<usize>;

    /// Number of records without coordinates, if recorded
    fn unplaced_count(&self) -> Option<u64>;

    /// Look up a reference by name
    fn reference(&self, name: &str) -> Option<&ReferenceIndex> {
        self.reference_id(name)
            .and_then(|id| self.references().get(id))
    }

    /// True if the index knows about `name`
    fn contains(&self, name: &str) -> bool {
        self.reference_id(name).is_some()
    }

    /// Reference names, in index order
    fn sequence_names(&self) -> Vec<&str> {
        self.references().iter().map(|r| r.name()).collect()
    }

    /// Chunks to read for `[begin, end)` on `name`, pruned and merged
    fn query_chunks(&self, name: &str, begin: u64, end: u64) -> Result<Vec<Chunk>> {
        self.resolve_chunks(name, begin, end, true)
    }

    /// Chunks to read for `[begin, end)` on `name`.
    ///
    /// Without `prune` the raw union of candidate bin chunks is returned, in
    /// bin order and possibly overlapping.
    fn resolve_chunks(&self, name: &str, begin: u64, end: u64, prune: bool) -> Result<Vec<Chunk>> {
        let reference = self
            .reference(name)
            .ok_or_else(|| TabixError::UnknownReference(name.to_string()))?;

        if begin >= end {
            return Err(TabixError::InvalidRange(format!(
                "start ({}) >= end ({})",
                begin, end
            )));
        }

        Ok(reference.chunks_for(self.binning(), begin, end, prune))
    }
}

/// A TBI or CSI index
#[derive(Debug, Clone)]
pub enum Index {
    /// Legacy fixed-depth index
    Tbi(TbiIndex),
    /// Generalized index
    Csi(CsiIndex),
}

impl Index {
    /// Load an index, picking the format from its magic bytes
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_index_stream(path)?;
        Self::from_reader(reader).map_err(|e| with_path(e, path))
    }

    /// Parse an uncompressed index stream
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_bytes(&mut reader, &mut magic)?;
        let mut stream = (&magic[..]).chain(reader);
        match &magic {
            tbi::TBI_MAGIC => Ok(Index::Tbi(TbiIndex::from_reader(&mut stream)?)),
            csi::CSI_MAGIC => Ok(Index::Csi(CsiIndex::from_reader(&mut stream)?)),
            _ => Err(TabixError::index(format!(
                "Unrecognised index magic: {:?}",
                magic
            ))),
        }
    }

    /// Find and load the index of a data file: `<path>.tbi`, then `<path>.csi`
    pub fn discover<P: AsRef<Path>>(data_path: P) -> Result<(PathBuf, Self)> {
        let data_path = data_path.as_ref();
        let tried = candidate_paths(data_path);
        for candidate in &tried {
            if candidate.is_file() {
                let index = Self::from_path(candidate)?;
                return Ok((candidate.clone(), index));
            }
        }
        Err(TabixError::MissingIndex {
            path: data_path.to_path_buf(),
            tried,
        })
    }

    fn inner(&self) -> &dyn TabixIndex {
        match self {
            Index::Tbi(index) => index,
            Index::Csi(index) => index,
        }
    }
}

impl TabixIndex for Index {
    fn columns(&self) -> &ColumnSpec {
        self.inner().columns()
    }

    fn binning(&self) -> Binning {
        self.inner().binning()
    }

    fn references(&self) -> &[ReferenceIndex] {
        self.inner().references()
    }

    fn reference_id(&self, name: &str) -> Option<usize> {
        self.inner().reference_id(name)
    }

    fn unplaced_count(&self) -> Option<u64> {
        self.inner().unplaced_count()
    }
}

impl From<TbiIndex> for Index {
    fn from(index: TbiIndex) -> Self {
        Index::Tbi(index)
    }
}

impl From<CsiIndex> for Index {
    fn from(index: CsiIndex) -> Self {
        Index::Csi(index)
    }
}

/// `<path>.tbi` and `<path>.csi`
pub fn candidate_paths(data_path: &Path) -> Vec<PathBuf> {
    INDEX_EXTENSIONS
        .iter()
        .map(|ext| {
            let mut name = data_path.as_os_str().to_owned();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        })
        .collect()
}

/// Open an index file, decompressing it if it starts with the gzip magic.
///
/// Index files written by bgzip are multi-member, so all members are read.
pub(crate) fn open_index_stream(path: &Path) -> Result<Box<dyn Read>> {
    let mut reader = BufReader::new(File::open(path)?);
    if reader.fill_buf()?.starts_with(&[0x1f, 0x8b]) {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Prefix an index format error with the file it came from
pub(crate) fn with_path(error: TabixError, path: &Path) -> TabixError {
    match error {
        TabixError::InvalidIndex { msg } => {
            TabixError::index(format!("{}: {}", path.display(), msg))
        }
        other => other,
    }
}

// Helper functions for reading binary data (little-endian)

pub(crate) fn read_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            TabixError::index("Unexpected end of index data")
        } else {
            e.into()
        }
    })
}

pub(crate) fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_bytes(reader, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_bytes(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_bytes(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read an int32 count that must not be negative
pub(crate) fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = read_i32(reader)?;
    usize::try_from(value).map_err(|_| TabixError::index(format!("Negative {}: {}", what, value)))
}

/// Read a trailing u64 that older indexers leave out
pub(crate) fn read_optional_u64<R: Read>(reader: &mut R) -> Result<Option<u64>> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(None),
        8 => Ok(Some(u64::from_le_bytes(buf))),
        n => Err(TabixError::index(format!(
            "Truncated unplaced-record count ({} of 8 bytes)",
            n
        ))),
    }
}
