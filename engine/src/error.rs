//! Error types for the Burrow engine.

use crate::DocId;
use thiserror::Error;

/// All possible errors from the Burrow engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Write errors
    #[error("document update conflict: {0}")]
    Conflict(DocId),

    #[error("document not found: {0}")]
    NotFound(DocId),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    // Index and query errors
    #[error("invalid index spec: {0}")]
    InvalidIndexSpec(String),

    #[error("no usable index for query: {0}")]
    NoUsableIndex(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    // State errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl Error {
    /// Whether the caller can recover by re-reading the current winner and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
