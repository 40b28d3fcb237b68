//! Query regions.
//!
//! A [`Region`] names a reference sequence and a **0-based, half-open**
//! interval `[start, end)` on it. Regions can also be parsed from the
//! samtools-style one-based inclusive syntax used on command lines:
//!
//! ```
//! use biotabix::formats::Region;
//!
//! let region: Region = "chr1:1,001-2,000".parse()?;
//! assert_eq!(region.name(), "chr1");
//! assert_eq!(region.start(), 1000);
//! assert_eq!(region.end(), 2000);
//!
//! let whole: Region = "chrX".parse()?;
//! assert!(whole.overlaps(100_000, 100_001));
//! # Ok::<(), biotabix::TabixError>(())
//! ```

use crate::error::{Result, TabixError};
use std::fmt;
use std::str::FromStr;

/// Reference name plus 0-based half-open interval
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    name: String,
    start: u64,
    end: u64,
}

impl Region {
    /// Create a region over `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`TabixError::InvalidRange`] if `start >= end`.
    pub fn new(name: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        if start >= end {
            return Err(TabixError::InvalidRange(format!(
                "start ({}) >= end ({})",
                start, end
            )));
        }
        Ok(Region {
            name: name.into(),
            start,
            end,
        })
    }

    /// Region covering a whole reference sequence
    pub fn whole(name: impl Into<String>) -> Self {
        Region {
            name: name.into(),
            start: 0,
            end: u64::MAX,
        }
    }

    /// Reference sequence name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start position (0-based, inclusive)
    pub fn start(&self) -> u64 {
        self.start
    }

    /// End position (0-based, exclusive); `u64::MAX` for an open end
    pub fn end(&self) -> u64 {
        self.end
    }

    /// True if `[begin, end)` shares at least one base with this region.
    ///
    /// An empty record interval is treated as the single base at `begin`.
    #[inline]
    pub fn overlaps(&self, begin: u64, end: u64) -> bool {
        let end = end.max(begin.saturating_add(1));
        begin < self.end && self.start < end
    }

    /// Same region on a differently named reference
    pub(crate) fn renamed(&self, name: &str) -> Region {
        Region {
            name: name.to_string(),
            start: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for Region {
    /// One-based inclusive, the inverse of [`FromStr`]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (0, u64::MAX) => write!(f, "{}", self.name),
            (start, u64::MAX) => write!(f, "{}:{}", self.name, start + 1),
            (start, end) => write!(f, "{}:{}-{}", self.name, start + 1, end),
        }
    }
}

impl FromStr for Region {
    type Err = TabixError;

    /// Parse `name`, `name:start` or `name:start-end` (1-based, inclusive,
    /// commas allowed). A name that itself contains `:` is kept whole when
    /// the text after the last `:` is not a position.
    ///
    /// Without an index the split is ambiguous: `HLA-A*01:01:01:01` reads
    /// as position 1 on `HLA-A*01:01:01`. Use
    /// [`TabixReader::parse_region`](crate::TabixReader::parse_region) to
    /// prefer a whole-string match against the indexed names.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TabixError::InvalidRegion(s.to_string());
        let s_trimmed = s.trim();
        if s_trimmed.is_empty() {
            return Err(invalid());
        }

        let Some((name, range)) = s_trimmed.rsplit_once(':') else {
            return Ok(Region::whole(s_trimmed));
        };
        let Some((start, end)) = parse_range(range) else {
            return Ok(Region::whole(s_trimmed));
        };

        if name.is_empty() || start == 0 {
            return Err(invalid());
        }
        let end = end.unwrap_or(u64::MAX);
        if end < start {
            return Err(invalid());
        }

        Ok(Region {
            name: name.to_string(),
            start: start - 1,
            end,
        })
    }
}

/// `start` or `start-end`, commas ignored
fn parse_range(range: &str) -> Option<(u64, Option<u64>)> {
    let number = |text: &str| -> Option<u64> {
        let digits: String = text.chars().filter(|&c| c != ',').collect();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    };

    match range.split_once('-') {
        Some((start, end)) => Some((number(start)?, Some(number(end)?))),
        None => Some((number(range)?, None)),
    }
}
