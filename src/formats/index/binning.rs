//! Hierarchical binning scheme shared by TBI and CSI
//!
//! The coordinate space is split into power-of-two tiles: the finest level
//! has tiles of `2^min_shift` bases and each coarser level is 8× larger, up to
//! a single root tile. Bins are numbered level by level, root first, so bin
//! numbers are unique across levels.
//!
//! The legacy TBI scheme is `min_shift = 14`, `depth = 5`:
//! - Level 0: bin 0 (512 Mbp)
//! - Level 1: bins 1-8 (64 Mbp each)
//! - Level 2: bins 9-72 (8 Mbp each)
//! - Level 3: bins 73-584 (1 Mbp each)
//! - Level 4: bins 585-4680 (128 Kbp each)
//! - Level 5: bins 4681-37448 (16 Kbp each)
//!
//! Bin 37450 (`max_bin + 2`) is reserved for per-reference metadata.

/// Binning parameters (finest tile size and number of levels below the root)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binning {
    min_shift: u32,
    depth: u32,
}

impl Binning {
    /// The fixed TBI/BAI scheme: 16 Kbp tiles, 5 levels below the root
    pub const TABIX: Binning = Binning {
        min_shift: 14,
        depth: 5,
    };

    /// Create a binning scheme.
    ///
    /// Returns `None` when the levels would not fit 64-bit coordinates or
    /// 32-bit bin numbers.
    pub fn new(min_shift: u32, depth: u32) -> Option<Self> {
        if depth > 9 || min_shift > 63 - 3 * depth {
            return None;
        }
        Some(Binning { min_shift, depth })
    }

    /// Finest tile size as a power of two
    pub fn min_shift(&self) -> u32 {
        self.min_shift
    }

    /// Number of levels below the root
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Exclusive upper bound of addressable coordinates
    pub fn max_position(&self) -> u64 {
        1u64 << (self.min_shift + 3 * self.depth)
    }

    /// Number of the first bin at `level` (0 = root)
    fn level_offset(level: u32) -> u64 {
        ((1u64 << (3 * level)) - 1) / 7
    }

    /// Largest regular bin number
    pub fn max_bin(&self) -> u32 {
        (Self::level_offset(self.depth + 1) - 1) as u32
    }

    /// Bin number reserved for per-reference metadata
    pub fn metadata_bin(&self) -> u32 {
        (Self::level_offset(self.depth + 1) + 1) as u32
    }

    /// Smallest bin whose tile fully contains `[begin, end)`.
    ///
    /// Levels are scanned finest first; the first level where `begin` and
    /// `end - 1` share a tile wins. An empty interval is treated as one base.
    pub fn bin_of(&self, begin: u64, end: u64) -> u32 {
        let last = end.max(begin + 1) - 1;
        let mut shift = self.min_shift;
        let mut level = self.depth;
        while level > 0 {
            if begin >> shift == last >> shift {
                return (Self::level_offset(level) + (begin >> shift)) as u32;
            }
            shift += 3;
            level -= 1;
        }
        0
    }

    /// Every bin whose tile intersects `[begin, end)`, coarsest level first.
    ///
    /// `end` is clamped to [`max_position`](Self::max_position); an empty
    /// interval yields no bins.
    pub fn candidate_bins(&self, begin: u64, end: u64) -> Vec<u32> {
        let end = end.min(self.max_position());
        if begin >= end {
            return Vec::new();
        }
        let last = end - 1;

        let mut bins = Vec::new();
        let mut shift = self.min_shift + 3 * self.depth;
        for level in 0..=self.depth {
            let offset = Self::level_offset(level);
            let first_bin = offset + (begin >> shift);
            let last_bin = offset + (last >> shift);
            bins.extend((first_bin..=last_bin).map(|b| b as u32));
            shift = shift.saturating_sub(3);
        }

        bins
    }

    /// Level (0 = root) a bin number belongs to
    pub fn level_of(&self, bin: u32) -> u32 {
        let bin = u64::from(bin);
        let mut level = 0;
        while level < self.depth && bin >= Self::level_offset(level + 1) {
            level += 1;
        }
        level
    }

    /// Enclosing bin one level up, `None` for the root
    pub fn parent(&self, bin: u32) -> Option<u32> {
        if bin == 0 {
            None
        } else {
            Some((bin - 1) >> 3)
        }
    }

    /// First coordinate covered by a bin
    pub fn bin_start(&self, bin: u32) -> u64 {
        let level = self.level_of(bin);
        let shift = self.min_shift + 3 * (self.depth - level);
        (u64::from(bin) - Self::level_offset(level)) << shift
    }
}

impl Default for Binning {
    fn default() -> Self {
        Binning::TABIX
    }
}
