//! CSI (Coordinate-Sorted Index) format support
//!
//! CSI is the successor to TBI: the binning depth and finest tile size are
//! stored in the header, so references longer than 512 Mbp can be indexed.
//!
//! ## Header
//! - Magic: "CSI\1" (4 bytes)
//! - min_shift: finest tile size as a power of two (int32, typically 14)
//! - depth: number of levels below the root (int32, typically 5 or 6)
//! - l_aux: size of auxiliary data (int32)
//! - aux: for text files, the same descriptor TBI stores inline
//!   (format, columns, meta, skip, l_nm, names)
//! - n_ref: Number of reference sequences (int32)
//!
//! ## Index Data (per reference)
//! - Binning index: bin number, `loffset`, then its chunks
//!
//! There is no linear index; `loffset` plays its part.
//!
//! ## Trailer
//! - n_no_coor: records without coordinates (uint64, optional)

use super::columns::{read_descriptor, ColumnSpec};
use super::{
    open_index_stream, read_bytes, read_count, read_i32, read_optional_u64, with_path, Binning,
    ReferenceIndex, TabixIndex,
};
use crate::error::{Result, TabixError};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// CSI file format magic string
pub(crate) const CSI_MAGIC: &[u8; 4] = b"CSI\x01";

/// Size of the fixed part of the tabix descriptor (seven int32 values)
const DESCRIPTOR_FIXED_LEN: usize = 28;

/// CSI index over a tab-delimited text file
#[derive(Debug, Clone)]
pub struct CsiIndex {
    binning: Binning,
    columns: ColumnSpec,
    references: Vec<ReferenceIndex>,
    ref_map: HashMap<String, usize>,
    n_no_coor: Option<u64>,
}

impl CsiIndex {
    /// Load CSI index from a file (compressed or raw)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = open_index_stream(path)?;
        let index = Self::from_reader(&mut reader).map_err(|e| with_path(e, path))?;
        debug!(
            path = %path.display(),
            min_shift = index.binning.min_shift(),
            depth = index.binning.depth(),
            references = index.references.len(),
            "loaded CSI index"
        );
        Ok(index)
    }

    /// Parse CSI index from an uncompressed stream
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let reader = &mut reader;

        let mut magic = [0u8; 4];
        read_bytes(reader, &mut magic)?;
        if &magic != CSI_MAGIC {
            return Err(TabixError::index(format!(
                "Invalid CSI magic: expected {:?}, got {:?}",
                CSI_MAGIC, magic
            )));
        }

        let min_shift = read_i32(reader)?;
        let depth = read_i32(reader)?;
        let binning = u32::try_from(min_shift)
            .ok()
            .zip(u32::try_from(depth).ok())
            .and_then(|(shift, depth)| Binning::new(shift, depth))
            .ok_or_else(|| {
                TabixError::index(format!(
                    "Unsupported CSI binning: min_shift={}, depth={}",
                    min_shift, depth
                ))
            })?;

        let l_aux = read_count(reader, "auxiliary data length")?;
        if l_aux < DESCRIPTOR_FIXED_LEN {
            return Err(TabixError::index(format!(
                "CSI auxiliary data ({} bytes) does not describe a tab-delimited layout",
                l_aux
            )));
        }
        let mut aux = Vec::new();
        reader.by_ref().take(l_aux as u64).read_to_end(&mut aux)?;
        if aux.len() != l_aux {
            return Err(TabixError::index("Unexpected end of index data in auxiliary block"));
        }
        let (columns, names) = read_descriptor(&mut &aux[..])?;

        let n_ref = read_count(reader, "reference count")?;
        if names.len() != n_ref {
            return Err(TabixError::index(format!(
                "CSI header claims {} references but got {} names",
                n_ref,
                names.len()
            )));
        }

        let mut references = Vec::with_capacity(n_ref);
        let mut ref_map = HashMap::new();

        for (idx, name) in names.into_iter().enumerate() {
            let mut reference = ReferenceIndex::new(name.clone());
            reference.read_bins(reader, binning, true)?;

            ref_map.insert(name, idx);
            references.push(reference);
        }

        let n_no_coor = read_optional_u64(reader)?;

        Ok(CsiIndex {
            binning,
            columns,
            references,
            ref_map,
            n_no_coor,
        })
    }

    /// Finest tile size as a power of two
    pub fn min_shift(&self) -> u32 {
        self.binning.min_shift()
    }

    /// Number of levels below the root
    pub fn depth(&self) -> u32 {
        self.binning.depth()
    }
}

impl TabixIndex for CsiIndex {
    fn columns(&self) -> &ColumnSpec {
        &self.columns
    }

    fn binning(&self) -> Binning {
        self.binning
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
