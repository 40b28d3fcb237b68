//! Per-reference index data shared by TBI and CSI

use super::{read_count, read_u32, read_u64, Binning};
use crate::error::Result;
use crate::io::{Chunk, VirtualOffset};
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// A bin in the hierarchical binning index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    /// Bin number
    pub id: u32,
    /// Lowest virtual offset of any record overlapping the bin (CSI only, zero for TBI)
    pub loffset: VirtualOffset,
    /// Chunks of data in this bin
    pub chunks: Vec<Chunk>,
}

/// Contents of the per-reference metadata pseudo-bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceStats {
    /// Virtual offset of the first record on this reference
    pub begin: VirtualOffset,
    /// Virtual offset just past the last record on this reference
    pub end: VirtualOffset,
    /// Number of placed records
    pub mapped: u64,
    /// Number of unplaced records
    pub unmapped: u64,
}

/// Bins, linear index and statistics for one reference sequence
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    name: String,
    bins: HashMap<u32, Bin>,
    intervals: Vec<VirtualOffset>,
    stats: Option<ReferenceStats>,
}

impl ReferenceIndex {
    /// Create an empty reference
    pub fn new(name: impl Into<String>) -> Self {
        ReferenceIndex {
            name: name.into(),
            bins: HashMap::new(),
            intervals: Vec::new(),
            stats: None,
        }
    }

    /// Reference sequence name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a bin by number
    pub fn bin(&self, id: u32) -> Option<&Bin> {
        self.bins.get(&id)
    }

    /// Number of data bins
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Linear index (TBI only): lowest record offset per 16 Kbp window
    pub fn intervals(&self) -> &[VirtualOffset] {
        &self.intervals
    }

    /// Metadata pseudo-bin contents, if the indexer wrote them
    pub fn stats(&self) -> Option<ReferenceStats> {
        self.stats
    }

    /// Read `n_bin` bins. CSI bins carry an `loffset` before their chunks.
    pub(crate) fn read_bins<R: Read>(
        &mut self,
        reader: &mut R,
        binning: Binning,
        with_loffset: bool,
    ) -> Result<()> {
        let n_bin = read_count(reader, "bin count")?;
        for _ in 0..n_bin {
            let id = read_u32(reader)?;
            let loffset = if with_loffset {
                VirtualOffset::from_raw(read_u64(reader)?)
            } else {
                VirtualOffset::default()
            };
            let n_chunk = read_count(reader, "chunk count")?;
            let mut chunks = Vec::new();
            for _ in 0..n_chunk {
                let start = VirtualOffset::from_raw(read_u64(reader)?);
                let end = VirtualOffset::from_raw(read_u64(reader)?);
                chunks.push(Chunk::new(start, end));
            }
            self.insert_bin(binning, Bin { id, loffset, chunks });
        }
        Ok(())
    }

    /// Read the `n_intv` linear index entries
    pub(crate) fn read_intervals<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let n_intv = read_count(reader, "interval count")?;
        for _ in 0..n_intv {
            self.intervals.push(VirtualOffset::from_raw(read_u64(reader)?));
        }
        Ok(())
    }

    fn insert_bin(&mut self, binning: Binning, bin: Bin) {
        if bin.id == binning.metadata_bin() {
            if let [span, counts] = &bin.chunks[..] {
                self.stats = Some(ReferenceStats {
                    begin: span.start,
                    end: span.end,
                    mapped: counts.start.as_raw(),
                    unmapped: counts.end.as_raw(),
                });
            } else {
                debug!(
                    reference = %self.name,
                    chunks = bin.chunks.len(),
                    "ignoring malformed metadata bin"
                );
            }
            return;
        }
        self.bins.insert(bin.id, bin);
    }

    /// Lowest virtual offset a record overlapping `begin` can start at.
    ///
    /// Uses the linear index when present, otherwise the `loffset` of the
    /// finest indexed bin enclosing `begin`. Zero when nothing is known.
    pub fn min_offset(&self, binning: Binning, begin: u64) -> VirtualOffset {
        if !self.intervals.is_empty() {
            let window = (begin >> binning.min_shift()) as usize;
            return self
                .intervals
                .get(window)
                .or_else(|| self.intervals.last())
                .copied()
                .unwrap_or_default();
        }

        let mut bin = binning.bin_of(begin, begin + 1);
        loop {
            if let Some(found) = self.bins.get(&bin) {
                return found.loffset;
            }
            match binning.parent(bin) {
                Some(parent) => bin = parent,
                None => return VirtualOffset::default(),
            }
        }
    }

    /// Chunks of every candidate bin for `[begin, end)`.
    ///
    /// With `prune`, chunks ending at or before [`min_offset`](Self::min_offset)
    /// are dropped and the rest sorted and merged; otherwise they are returned
    /// in bin order, duplicates included.
    pub fn chunks_for(&self, binning: Binning, begin: u64, end: u64, prune: bool) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = binning
            .candidate_bins(begin, end)
            .into_iter()
            .filter_map(|id| self.bins.get(&id))
            .flat_map(|bin| bin.chunks.iter().copied())
            .filter(|chunk| !chunk.is_empty())
            .collect();

        if prune {
            let min_offset = self.min_offset(binning, begin);
            chunks.retain(|chunk| chunk.end > min_offset);
            chunks = crate::io::merge_chunks(chunks);
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(a: u64, b: u64) -> Chunk {
        Chunk::new(VirtualOffset::new(a, 0), VirtualOffset::new(b, 0))
    }

    fn reference_with(bins: Vec<(u32, u64, Vec<Chunk>)>) -> ReferenceIndex {
        let mut reference = ReferenceIndex::new("chr1");
        for (id, loffset, chunks) in bins {
            reference.insert_bin(
                Binning::TABIX,
                Bin {
                    id,
                    loffset: VirtualOffset::new(loffset, 0),
                    chunks,
                },
            );
        }
        reference
    }

    #[test]
    fn test_metadata_bin_becomes_stats() {
        let reference = reference_with(vec![
            (4681, 0, vec![chunk(0, 100)]),
            (
                37450,
                0,
                vec![
                    chunk(0, 100),
                    Chunk::new(VirtualOffset::from_raw(42), VirtualOffset::from_raw(3)),
                ],
            ),
        ]);
        assert_eq!(reference.bin_count(), 1);
        assert!(reference.bin(37450).is_none());
        let stats = reference.stats().unwrap();
        assert_eq!(stats.mapped, 42);
        assert_eq!(stats.unmapped, 3);
        assert_eq!(stats.end, VirtualOffset::new(100, 0));
    }

    #[test]
    fn test_chunks_for_collects_candidates() {
        let reference = reference_with(vec![
            (0, 0, vec![chunk(500, 600)]),
            (4681, 0, vec![chunk(100, 200)]),
            (4682, 0, vec![chunk(200, 300)]),
        ]);
        let unpruned = reference.chunks_for(Binning::TABIX, 0, 100, false);
        assert_eq!(unpruned, vec![chunk(500, 600), chunk(100, 200)]);

        let pruned = reference.chunks_for(Binning::TABIX, 0, 20000, true);
        assert_eq!(pruned, vec![chunk(100, 300), chunk(500, 600)]);
    }

    #[test]
    fn test_linear_index_prunes() {
        let mut reference = reference_with(vec![
            (0, 0, vec![chunk(100, 150)]),
            (4682, 0, vec![chunk(200, 300)]),
        ]);
        reference.intervals = vec![VirtualOffset::new(100, 0), VirtualOffset::new(200, 0)];

        assert_eq!(reference.min_offset(Binning::TABIX, 16384), VirtualOffset::new(200, 0));
        // beyond the linear index the last entry applies
        assert_eq!(reference.min_offset(Binning::TABIX, 1 << 20), VirtualOffset::new(200, 0));
        assert_eq!(
            reference.chunks_for(Binning::TABIX, 16384, 16400, true),
            vec![chunk(200, 300)]
        );
    }

    #[test]
    fn test_loffset_climbs_to_parent() {
        let reference = reference_with(vec![(585, 250, vec![chunk(200, 300)])]);
        assert_eq!(reference.min_offset(Binning::TABIX, 16384), VirtualOffset::new(250, 0));
        let empty = ReferenceIndex::new("chr2");
        assert_eq!(empty.min_offset(Binning::TABIX, 0), VirtualOffset::default());
    }
}
