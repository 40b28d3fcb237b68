//! TBI (Tabix) index format support
//!
//! Parsing of Tabix index files (.tbi), which enable fast random access to
//! sorted, tab-delimited, BGZF-compressed genomic files.
//!
//! # Format Layout
//!
//! TBI files are BGZF-compressed binary indexes with the following structure:
//!
//! ## Header
//! - Magic: "TBI\1" (4 bytes)
//! - n_ref: Number of reference sequences (int32)
//! - format, col_seq, col_beg, col_end, meta, skip (int32 each, see [`ColumnSpec`])
//! - l_nm: Length of concatenated sequence names (int32)
//! - names: Sequence names (null-terminated strings)
//!
//! ## Index Data (per reference)
//! - Binning index: bin number, then its chunks
//! - Linear index: lowest record offset of each 16 Kbp window
//!
//! ## Trailer
//! - n_no_coor: records without coordinates (uint64, optional)
//!
//! # Binning Scheme
//!
//! Same as BAI: [`Binning::TABIX`], 37,449 data bins covering 512 Mbp.
//! Bin 37450 holds per-reference statistics rather than data.
//!
//! # Example
//!
//! ```no_run
//! use biotabix::formats::index::{TabixIndex, TbiIndex};
//!
//! # fn main() -> biotabix::Result<()> {
//! let index = TbiIndex::from_path("data.vcf.gz.tbi")?;
//!
//! println!("Preset: {:?}", index.columns().preset());
//! println!("References: {}", index.references().len());
//!
//! let chunks = index.query_chunks("chr1", 1_000_000, 2_000_000)?;
//! for chunk in chunks {
//!     println!("Chunk: {} - {}", chunk.start, chunk.end);
//! }
//! # Ok(())
//! # }
//! ```

use super::columns::{read_descriptor, ColumnSpec};
use super::{
    open_index_stream, read_bytes, read_count, read_optional_u64, with_path, Binning,
    ReferenceIndex, TabixIndex,
};
use crate::error::{Result, TabixError};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// TBI file format magic string
pub(crate) const TBI_MAGIC: &[u8; 4] = b"TBI\x01";

/// TBI (Tabix) index
///
/// Provides fast random access to sorted, tab-delimited, BGZF-compressed files.
#[derive(Debug, Clone)]
pub struct TbiIndex {
    columns: ColumnSpec,
    references: Vec<ReferenceIndex>,
    ref_map: HashMap<String, usize>,
    n_no_coor: Option<u64>,
}

impl TbiIndex {
    /// Load TBI index from a file (compressed or raw)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use biotabix::formats::index::{TabixIndex, TbiIndex};
    ///
    /// # fn main() -> biotabix::Result<()> {
    /// let index = TbiIndex::from_path("data.vcf.gz.tbi")?;
    /// println!("Loaded {} references", index.references().len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = open_index_stream(path)?;
        let index = Self::from_reader(&mut reader).map_err(|e| with_path(e, path))?;
        debug!(
            path = %path.display(),
            references = index.references.len(),
            "loaded TBI index"
        );
        Ok(index)
    }

    /// Parse TBI index from an uncompressed stream
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let reader = &mut reader;

        let mut magic = [0u8; 4];
        read_bytes(reader, &mut magic)?;
        if &magic != TBI_MAGIC {
            return Err(TabixError::index(format!(
                "Invalid TBI magic: expected {:?}, got {:?}",
                TBI_MAGIC, magic
            )));
        }

        let n_ref = read_count(reader, "reference count")?;
        let (columns, names) = read_descriptor(reader)?;

        if names.len() != n_ref {
            return Err(TabixError::index(format!(
                "TBI header claims {} references but got {} names",
                n_ref,
                names.len()
            )));
        }

        let mut references = Vec::with_capacity(n_ref);
        let mut ref_map = HashMap::new();

        for (idx, name) in names.into_iter().enumerate() {
            let mut reference = ReferenceIndex::new(name.clone());
            reference.read_bins(reader, Binning::TABIX, false)?;
            reference.read_intervals(reader)?;

            ref_map.insert(name, idx);
            references.push(reference);
        }

        let n_no_coor = read_optional_u64(reader)?;

        Ok(TbiIndex {
            columns,
            references,
            ref_map,
            n_no_coor,
        })
    }
}

impl TabixIndex for TbiIndex {
    fn columns(&self) -> &ColumnSpec {
        &self.columns
    }

    fn binning(&self) -> Binning {
        Binning::TABIX
    }

    fn references(&self) -> &[ReferenceIndex] {
        &self.references
    }

    fn reference_id(&self, name: &str) -> Option<usize> {
        self.ref_map.get(name).copied()
    }

    fn unplaced_count(&self) -> Option<u64> {
        self.n_no_coor
    }
}
