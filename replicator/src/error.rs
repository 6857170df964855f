//! Error types for replication.

use thiserror::Error;

/// Errors that can end or interrupt a replication pass.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Network failure, timeout or overloaded peer. Safe to retry.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The peer refused the exchange (authorization, protocol mismatch,
    /// rejected revisions). Retrying will not help.
    #[error("Fatal peer error: {0}")]
    Fatal(String),

    /// The local store failed.
    #[error("Local store error: {0}")]
    Local(#[from] burrow_engine::Error),
}

impl ReplicationError {
    /// Whether the failed pass may be retried.
    ///
    /// Local storage failures are retried like network ones; every other local
    /// error means the data itself is unusable.
    pub fn is_transient(&self) -> bool {
        match self {
            ReplicationError::Transient(_) => true,
            ReplicationError::Local(e) => matches!(e, burrow_engine::Error::Storage(_)),
            ReplicationError::Fatal(_) => false,
        }
    }

    /// Classify an error raised by a remote store reached in-process.
    pub(crate) fn from_remote(error: burrow_engine::Error) -> Self {
        match error {
            burrow_engine::Error::Storage(msg) => ReplicationError::Transient(msg),
            other => ReplicationError::Fatal(other.to_string()),
        }
    }
}

/// Result type for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;
