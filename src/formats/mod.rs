//! File format descriptions: index layouts and query regions.
//!
//! - [`index`]: TBI and CSI index readers, binning, column layouts
//! - [`region`]: reference name plus 0-based half-open interval

pub mod index;
pub mod region;

pub use index::{ColumnSpec, CsiIndex, Index, Preset, TabixIndex, TbiIndex};
pub use region::Region;
