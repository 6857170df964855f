//! Replication checkpoints.
//!
//! A checkpoint records how far replication between this store and one remote
//! peer has progressed in each direction. Values only move forward.

use crate::{NodeId, Sequence};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Progress of one replication pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Last local sequence acknowledged by the remote (push direction)
    pub source_seq: Sequence,
    /// Last remote sequence applied locally (pull direction)
    pub target_seq: Sequence,
}

/// Stable identifier for a (local node, remote endpoint) pair.
pub fn replication_id(local: &NodeId, remote_endpoint: &str) -> String {
    let digest = Sha256::digest(format!("{}\n{}", local, remote_endpoint).as_bytes());
    digest.iter().take(12).map(|b| format!("{:02x}", b)).collect()
}

/// Checkpoints keyed by replication id.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    entries: RwLock<BTreeMap<String, Checkpoint>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(entries: BTreeMap<String, Checkpoint>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Current checkpoint for a replication id (zeroes when unknown).
    pub fn get(&self, replication_id: &str) -> Checkpoint {
        self.entries
            .read()
            .get(replication_id)
            .copied()
            .unwrap_or_default()
    }

    /// Raise the push checkpoint. Returns the stored value.
    pub fn advance_source(&self, replication_id: &str, seq: Sequence) -> Checkpoint {
        self.update(replication_id, |cp| cp.source_seq = cp.source_seq.max(seq))
    }

    /// Raise the pull checkpoint. Returns the stored value.
    pub fn advance_target(&self, replication_id: &str, seq: Sequence) -> Checkpoint {
        self.update(replication_id, |cp| cp.target_seq = cp.target_seq.max(seq))
    }

    fn update(&self, replication_id: &str, f: impl FnOnce(&mut Checkpoint)) -> Checkpoint {
        let mut entries = self.entries.write();
        let checkpoint = entries.entry(replication_id.to_string()).or_default();
        f(checkpoint);
        *checkpoint
    }

    /// Copy of every checkpoint, for persistence.
    pub fn to_map(&self) -> BTreeMap<String, Checkpoint> {
        self.entries.read().clone()
    }
}
