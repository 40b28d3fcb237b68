//! biotabix: indexed region queries over BGZF-compressed text files
//!
//! # Overview
//!
//! biotabix reads sorted, tab-delimited genomic files (VCF, BED, GFF, SAM)
//! compressed with bgzip and indexed by tabix, and returns the records that
//! overlap a region without inflating the rest of the file.
//!
//! ## Key Features
//!
//! - **BGZF codec**: random-access block reader and append-only writer
//! - **TBI and CSI**: both index layouts behind one [`TabixIndex`] trait
//! - **Streaming queries**: records are yielded lazily, block by block
//! - **Exact bytes**: records come back as they are stored, never re-encoded
//!
//! ## Quick Start
//!
//! ```no_run
//! use biotabix::{Region, TabixReader};
//!
//! # fn main() -> biotabix::Result<()> {
//! // Finds variants.vcf.gz.tbi or variants.vcf.gz.csi
//! let mut reader = TabixReader::from_path("variants.vcf.gz")?;
//!
//! let region: Region = "chr1:1,000,001-2,000,000".parse()?;
//! for record in reader.query(&region)? {
//!     let record = record?;
//!     println!("{}", String::from_utf8_lossy(record.as_bytes()));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`io`]: BGZF blocks, virtual offsets, [`TabixReader`] and its record iterator
//! - [`formats`]: TBI/CSI index parsing, binning, column layouts, regions
//! - [`error`]: [`TabixError`] and the crate [`Result`] alias
//!
//! ## Logging
//!
//! Diagnostics go through [`tracing`]; install a subscriber to see them.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod formats;
pub mod io;

// Re-export commonly used types
pub use error::{Result, TabixError};
pub use formats::index::{Binning, ColumnSpec, CsiIndex, Index, Preset, TabixIndex, TbiIndex};
pub use formats::Region;
pub use io::{
    BgzfReader, BgzfWriter, Chunk, Record, Records, TabixReader, TabixReaderBuilder,
    VirtualOffset,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
