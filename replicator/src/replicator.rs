//! One replication pairing between a local store and a peer.
//!
//! Pull and push are both checkpointed per page: the checkpoint for a page
//! is persisted only after every revision in it is durably stored on the
//! receiving side. A pass interrupted anywhere therefore redelivers at most
//! one page, and redelivery is harmless because storing a known revision is
//! a no-op.

use crate::config::ReplicationOptions;
use crate::error::{ReplicationError, Result};
use crate::peer::Peer;
use burrow_engine::{
    replication_id, Checkpoint, ForeignApply, PeerInfo, RevId, RevisionPayload, RevsDiffRequest,
    Sequence, Store,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Which way revisions flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Peer to local store
    Pull,
    /// Local store to peer
    Push,
    #[default]
    Both,
}

impl Direction {
    pub fn pulls(self) -> bool {
        matches!(self, Direction::Pull | Direction::Both)
    }

    pub fn pushes(self) -> bool {
        matches!(self, Direction::Push | Direction::Both)
    }
}

/// Counters for one replication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationStats {
    /// Change entries examined, both directions
    pub docs_read: usize,
    /// Revisions newly stored on the receiving side, both directions
    pub docs_written: usize,
    /// Peer feed position pulled up to
    pub pull_seq: Sequence,
    /// Local feed position pushed up to
    pub push_seq: Sequence,
}

/// Replicates one local store with one peer.
pub struct Replicator {
    store: Arc<Store>,
    peer: Arc<dyn Peer>,
    options: ReplicationOptions,
    replication_id: String,
}

impl std::fmt::Debug for Replicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator")
            .field("node_id", self.store.node_id())
            .field("endpoint", &self.peer.endpoint())
            .field("replication_id", &self.replication_id)
            .finish()
    }
}

impl Replicator {
    pub fn new(store: Arc<Store>, peer: Arc<dyn Peer>, options: ReplicationOptions) -> Self {
        let replication_id = replication_id(store.node_id(), peer.endpoint());
        Self {
            store,
            peer,
            options,
            replication_id,
        }
    }

    /// Key of this pairing's checkpoint in the local store.
    pub fn replication_id(&self) -> &str {
        &self.replication_id
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn peer(&self) -> &Arc<dyn Peer> {
        &self.peer
    }

    pub fn options(&self) -> &ReplicationOptions {
        &self.options
    }

    /// Persisted progress of this pairing.
    pub fn checkpoint(&self) -> Checkpoint {
        self.store.checkpoint(&self.replication_id)
    }

    /// Run `call` with the request timeout; expiry is transient.
    async fn call<T>(&self, wait: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.options.request_timeout + wait, call).await {
            Ok(result) => result,
            Err(_) => Err(ReplicationError::Transient(format!(
                "request to {} timed out",
                self.peer.endpoint()
            ))),
        }
    }

    /// Check the peer is reachable.
    pub async fn connect(&self) -> Result<PeerInfo> {
        let info = self.call(Duration::ZERO, self.peer.info()).await?;
        tracing::debug!(
            endpoint = %self.peer.endpoint(),
            peer_node = %info.node_id,
            peer_seq = info.last_seq,
            "connected to peer"
        );
        Ok(info)
    }

    /// Run until both requested directions are caught up.
    pub async fn replicate_once(&self, direction: Direction) -> Result<ReplicationStats> {
        let mut stats = self.initial_stats();
        if direction.pulls() {
            self.pull(&mut stats).await?;
        }
        if direction.pushes() {
            self.push(&mut stats).await?;
        }
        tracing::info!(
            replication_id = %self.replication_id,
            docs_read = stats.docs_read,
            docs_written = stats.docs_written,
            pull_seq = stats.pull_seq,
            push_seq = stats.push_seq,
            "replication pass complete"
        );
        Ok(stats)
    }

    /// Stats seeded with the persisted checkpoint.
    pub(crate) fn initial_stats(&self) -> ReplicationStats {
        let checkpoint = self.checkpoint();
        ReplicationStats {
            pull_seq: checkpoint.target_seq,
            push_seq: checkpoint.source_seq,
            ..ReplicationStats::default()
        }
    }

    /// Pull every page the peer has beyond the checkpoint.
    pub async fn pull(&self, stats: &mut ReplicationStats) -> Result<()> {
        while self.pull_page(stats).await? {}
        Ok(())
    }

    /// Pull one page. Returns whether a full page was read, i.e. more may follow.
    pub async fn pull_page(&self, stats: &mut ReplicationStats) -> Result<bool> {
        let since = self.checkpoint().target_seq;
        let batch = self.options.batch_size;
        let page = self
            .call(Duration::ZERO, self.peer.changes(since, batch, None))
            .await?;
        if page.results.is_empty() {
            return Ok(false);
        }

        let mut offered = RevsDiffRequest::new();
        for entry in &page.results {
            let revs = offered.entry(entry.id.clone()).or_default();
            if !revs.contains(&entry.rev) {
                revs.push(entry.rev.clone());
            }
        }

        for (id, revs) in self.store.revs_diff(&offered) {
            for rev in revs {
                let payload = self
                    .call(Duration::ZERO, self.peer.fetch_revision(&id, &rev))
                    .await?;
                if payload.doc.id != id || payload.rev() != Some(&rev) {
                    return Err(ReplicationError::Fatal(format!(
                        "peer answered {}@{} with a different revision",
                        id, rev
                    )));
                }
                if let ForeignApply::Applied(_) = self.store.apply_foreign_revision(payload)? {
                    stats.docs_written += 1;
                }
            }
        }

        let checkpoint = self
            .store
            .advance_target_checkpoint(&self.replication_id, page.last_seq)?;
        stats.docs_read += page.results.len();
        stats.pull_seq = checkpoint.target_seq;

        tracing::debug!(
            replication_id = %self.replication_id,
            entries = page.results.len(),
            target_seq = checkpoint.target_seq,
            "pulled page"
        );
        Ok(page.results.len() >= batch)
    }

    /// Push every local change beyond the checkpoint.
    pub async fn push(&self, stats: &mut ReplicationStats) -> Result<()> {
        while self.push_batch(stats).await? {}
        Ok(())
    }

    /// Push one batch. Returns whether a full batch was read, i.e. more may follow.
    pub async fn push_batch(&self, stats: &mut ReplicationStats) -> Result<bool> {
        let since = self.checkpoint().source_seq;
        let batch = self.options.batch_size;
        let entries = self.store.changes_since(since, batch);
        let Some(last_seq) = entries.last().map(|entry| entry.seq) else {
            return Ok(false);
        };

        let mut offered = RevsDiffRequest::new();
        for entry in &entries {
            let revs = offered.entry(entry.id.clone()).or_default();
            if !revs.contains(&entry.rev) {
                revs.push(entry.rev.clone());
            }
        }

        let missing = self
            .call(Duration::ZERO, self.peer.revs_diff(&offered))
            .await?;
        let payloads = missing
            .iter()
            .flat_map(|(id, revs)| revs.iter().map(move |rev| (id, rev)))
            .map(|(id, rev)| self.local_payload(id, rev))
            .collect::<Result<Vec<_>>>()?;

        if !payloads.is_empty() {
            let response = self
                .call(Duration::ZERO, self.peer.bulk_docs(payloads))
                .await?;
            if let Some(refused) = response.errors.first() {
                return Err(ReplicationError::Fatal(format!(
                    "peer refused {} revision(s), first {}: {}",
                    response.errors.len(),
                    refused.id,
                    refused.reason
                )));
            }
            stats.docs_written += response.ok;
        }

        let checkpoint = self
            .store
            .advance_source_checkpoint(&self.replication_id, last_seq)?;
        stats.docs_read += entries.len();
        stats.push_seq = checkpoint.source_seq;

        tracing::debug!(
            replication_id = %self.replication_id,
            entries = entries.len(),
            source_seq = checkpoint.source_seq,
            "pushed batch"
        );
        Ok(entries.len() >= batch)
    }

    fn local_payload(&self, id: &str, rev: &RevId) -> Result<RevisionPayload> {
        Ok(self.store.revision_payload(id, Some(rev))?)
    }

    /// Wait until the local store has changes beyond the push checkpoint.
    pub(crate) async fn wait_local(&self) {
        let since = self.checkpoint().source_seq;
        let mut subscription = self.store.subscribe(Some(since));
        subscription.next().await;
    }

    /// Long-poll the peer until it has changes beyond the pull checkpoint.
    ///
    /// Returns normally on a change or when the long-poll expires empty.
    pub(crate) async fn wait_remote(&self) -> Result<()> {
        let since = self.checkpoint().target_seq;
        let wait = self.options.longpoll_timeout;
        self.call(wait, self.peer.changes(since, 1, Some(wait)))
            .await
            .map(|_| ())
    }
}
