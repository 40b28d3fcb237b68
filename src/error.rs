//! Error types for biotabix

use crate::io::VirtualOffset;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for biotabix operations
pub type Result<T> = std::result::Result<T, TabixError>;

/// Error types that can occur in biotabix
#[derive(Debug, Error)]
pub enum TabixError {
    /// I/O error from the underlying file or stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed BGZF container (bad magic, missing BC subfield, truncation)
    #[error(
        "Invalid BGZF block at offset {offset}{}: {msg}",
        path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default()
    )]
    InvalidBgzf {
        /// Container file, when the reader was opened from a path
        path: Option<PathBuf>,
        /// Compressed byte offset of the offending block
        offset: u64,
        /// Error message
        msg: String,
    },

    /// Malformed TBI/CSI index file
    #[error("Invalid index: {msg}")]
    InvalidIndex {
        /// Error message
        msg: String,
    },

    /// Neither `.tbi` nor `.csi` exists next to the container
    #[error("No index found for {}: tried {}", path.display(), tried.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    MissingIndex {
        /// Container path
        path: PathBuf,
        /// Index paths that were tried
        tried: Vec<PathBuf>,
    },

    /// Reference sequence absent from the index
    #[error("Reference '{0}' not found in index")]
    UnknownReference(String),

    /// A record could not be mapped onto the index's column layout
    #[error("Malformed record at {offset}: {msg}")]
    RecordParse {
        /// Virtual offset of the record's first byte
        offset: VirtualOffset,
        /// Error message
        msg: String,
    },

    /// Invalid query range
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Region string that cannot be parsed
    #[error("Invalid region '{0}'")]
    InvalidRegion(String),
}

impl TabixError {
    pub(crate) fn bgzf(offset: u64, msg: impl Into<String>) -> Self {
        TabixError::InvalidBgzf {
            path: None,
            offset,
            msg: msg.into(),
        }
    }

    pub(crate) fn index(msg: impl Into<String>) -> Self {
        TabixError::InvalidIndex { msg: msg.into() }
    }
}
