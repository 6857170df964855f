//! The remote side of a replication.

use crate::error::Result;
use async_trait::async_trait;
use burrow_engine::{
    BulkDocsResponse, ChangesResponse, PeerInfo, RevId, RevisionPayload, RevsDiffRequest,
    RevsDiffResponse, Sequence,
};
use std::time::Duration;

/// A store replicated with, reached over some transport.
///
/// Implementations classify their failures: anything worth retrying is
/// [`ReplicationError::Transient`](crate::ReplicationError::Transient).
#[async_trait]
pub trait Peer: Send + Sync {
    /// Stable address of the peer; part of the replication id.
    fn endpoint(&self) -> &str;

    /// Identity and feed position.
    async fn info(&self) -> Result<PeerInfo>;

    /// Change entries after `since`.
    ///
    /// With `wait`, an empty result is held back until an entry arrives or
    /// the wait elapses.
    async fn changes(
        &self,
        since: Sequence,
        limit: usize,
        wait: Option<Duration>,
    ) -> Result<ChangesResponse>;

    /// The offered revisions the peer does not hold.
    async fn revs_diff(&self, offered: &RevsDiffRequest) -> Result<RevsDiffResponse>;

    /// A revision with its ancestry.
    async fn fetch_revision(&self, id: &str, rev: &RevId) -> Result<RevisionPayload>;

    /// Store revisions on the peer.
    async fn bulk_docs(&self, docs: Vec<RevisionPayload>) -> Result<BulkDocsResponse>;
}
