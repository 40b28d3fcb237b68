//! Region queries over tabix-indexed files
//!
//! [`TabixReader`] pairs a BGZF container with its TBI or CSI index. A query
//! resolves the region to chunks through the index, then streams the
//! chunks' blocks and yields the records overlapping the region as
//! [`Record`]s holding the exact bytes of each line.

mod lines;
mod reader;
mod records;

pub use lines::Record;
pub use reader::{TabixReader, TabixReaderBuilder};
pub use records::Records;
