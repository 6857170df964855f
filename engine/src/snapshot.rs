//! Full-state snapshots of a store.
//!
//! A snapshot holds every revision tree, the whole change feed, index
//! definitions and replication checkpoints. `Store::compact` writes one so
//! the journal can be truncated, and `export_state`/`import_state` move a
//! store between processes. Serialization is deterministic: maps are ordered.

use crate::{
    checkpoint::Checkpoint, error::Result, feed::ChangeEntry, index::IndexDef, tree::RevTree,
    DocId, Error, NodeId, Sequence,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot format. Snapshots with a newer version are rejected.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A consistent copy of a store taken between commits.
///
/// Index entries are not stored; they are rebuilt from the revision trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Node ID of the store
    pub node_id: NodeId,
    /// Highest sequence covered by this snapshot
    pub last_seq: Sequence,
    /// Revision tree of every document
    pub documents: BTreeMap<DocId, RevTree>,
    /// The full change feed
    pub changes: Vec<ChangeEntry>,
    /// Index definitions
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    /// Replication checkpoints by replication id
    #[serde(default)]
    pub checkpoints: BTreeMap<String, Checkpoint>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            node_id: node_id.into(),
            last_seq: 0,
            documents: BTreeMap::new(),
            changes: Vec::new(),
            indexes: Vec::new(),
            checkpoints: BTreeMap::new(),
        }
    }

    /// Count documents, tombstoned ones included.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Count documents whose winner is live.
    pub fn active_document_count(&self) -> usize {
        self.documents.values().filter(|t| !t.is_deleted()).count()
    }

    /// Check internal consistency: the feed is gap-free from 1 and ends at
    /// `last_seq`, and every entry refers to a known revision.
    pub fn validate(&self) -> Result<()> {
        for (i, entry) in self.changes.iter().enumerate() {
            if entry.seq != i as Sequence + 1 {
                return Err(Error::InvalidSnapshot(format!(
                    "change feed gap at sequence {}",
                    entry.seq
                )));
            }
            let known = self
                .documents
                .get(&entry.id)
                .is_some_and(|tree| tree.contains(&entry.rev));
            if !known {
                return Err(Error::InvalidSnapshot(format!(
                    "change {} refers to unknown revision {} of '{}'",
                    entry.seq, entry.rev, entry.id
                )));
            }
        }
        if self.changes.len() as Sequence != self.last_seq {
            return Err(Error::InvalidSnapshot(format!(
                "last sequence {} does not match {} changes",
                self.last_seq,
                self.changes.len()
            )));
        }
        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

/// Metadata about a snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub node_id: NodeId,
    pub last_seq: Sequence,
    pub document_count: usize,
    pub index_count: usize,
}

impl From<&StoreSnapshot> for SnapshotMetadata {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            node_id: snapshot.node_id.clone(),
            last_seq: snapshot.last_seq,
            document_count: snapshot.document_count(),
            index_count: snapshot.indexes.len(),
        }
    }
}
