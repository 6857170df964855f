//! Integration tests for replication between stores.

use async_trait::async_trait;
use burrow_engine::{
    BulkDocsResponse, ChangesResponse, Document, PeerInfo, RevId, RevisionPayload,
    RevsDiffRequest, RevsDiffResponse, Sequence, Store, StoreConfig,
};
use burrow_replicator::{
    start_replication, stop_replication, BackoffPolicy, Direction, LocalPeer, Peer,
    ReplicationError, ReplicationEvent, ReplicationOptions, ReplicationStatus, Replicator,
    Result,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A peer whose first `stalls` revs_diff calls hang past any timeout.
struct FlakyPeer {
    inner: LocalPeer,
    stalls: AtomicUsize,
    revs_diff_calls: AtomicUsize,
    pushed: AtomicUsize,
}

impl FlakyPeer {
    fn new(remote: Arc<Store>, stalls: usize) -> Self {
        Self {
            inner: LocalPeer::new(remote),
            stalls: AtomicUsize::new(stalls),
            revs_diff_calls: AtomicUsize::new(0),
            pushed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Peer for FlakyPeer {
    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    async fn info(&self) -> Result<PeerInfo> {
        self.inner.info().await
    }

    async fn changes(
        &self,
        since: Sequence,
        limit: usize,
        wait: Option<Duration>,
    ) -> Result<ChangesResponse> {
        self.inner.changes(since, limit, wait).await
    }

    async fn revs_diff(&self, offered: &RevsDiffRequest) -> Result<RevsDiffResponse> {
        self.revs_diff_calls.fetch_add(1, Ordering::SeqCst);
        let stall = self
            .stalls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.revs_diff(offered).await
    }

    async fn fetch_revision(&self, id: &str, rev: &RevId) -> Result<RevisionPayload> {
        self.inner.fetch_revision(id, rev).await
    }

    async fn bulk_docs(&self, docs: Vec<RevisionPayload>) -> Result<BulkDocsResponse> {
        self.pushed.fetch_add(docs.len(), Ordering::SeqCst);
        self.inner.bulk_docs(docs).await
    }
}

/// A peer that rejects every call as unauthorized.
struct RejectingPeer;

#[async_trait]
impl Peer for RejectingPeer {
    fn endpoint(&self) -> &str {
        "http://rejecting.invalid"
    }

    async fn info(&self) -> Result<PeerInfo> {
        Err(ReplicationError::Fatal("401 Unauthorized".into()))
    }

    async fn changes(&self, _: Sequence, _: usize, _: Option<Duration>) -> Result<ChangesResponse> {
        Err(ReplicationError::Fatal("401 Unauthorized".into()))
    }

    async fn revs_diff(&self, _: &RevsDiffRequest) -> Result<RevsDiffResponse> {
        Err(ReplicationError::Fatal("401 Unauthorized".into()))
    }

    async fn fetch_revision(&self, _: &str, _: &RevId) -> Result<RevisionPayload> {
        Err(ReplicationError::Fatal("401 Unauthorized".into()))
    }

    async fn bulk_docs(&self, _: Vec<RevisionPayload>) -> Result<BulkDocsResponse> {
        Err(ReplicationError::Fatal("401 Unauthorized".into()))
    }
}

fn quick_options() -> ReplicationOptions {
    ReplicationOptions::new()
        .request_timeout(Duration::from_secs(1))
        .backoff(BackoffPolicy::new(
            Duration::from_millis(100),
            Duration::from_secs(2),
        ))
}

fn seed(store: &Store, prefix: &str, n: usize) {
    for i in 0..n {
        store
            .put(Document::new(format!("{}-{}", prefix, i), json!({ "i": i })), None)
            .unwrap();
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[cfg(test)]
mod retry_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_push_survives_three_timeouts() {
        let local = Arc::new(Store::new("local"));
        let remote = Arc::new(Store::new("remote"));
        seed(&local, "doc", 5);

        let peer = Arc::new(FlakyPeer::new(Arc::clone(&remote), 3));
        let mut handle = start_replication(Arc::clone(&local), peer.clone(), quick_options());
        let replication_id = handle.replication_id().to_string();

        let event = tokio::time::timeout(Duration::from_secs(600), handle.events().recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(ReplicationEvent::Completed(_))), "{:?}", event);

        assert_eq!(peer.revs_diff_calls.load(Ordering::SeqCst), 4);
        assert_eq!(peer.pushed.load(Ordering::SeqCst), 5);
        assert_eq!(remote.doc_count(), 5);
        assert_eq!(remote.last_seq(), 5);
        assert_eq!(local.checkpoint(&replication_id).source_seq, 5);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_without_retry_ends_session() {
        let local = Arc::new(Store::new("local"));
        let remote = Arc::new(Store::new("remote"));
        seed(&local, "doc", 2);

        let peer = Arc::new(FlakyPeer::new(Arc::clone(&remote), 1));
        let mut handle = start_replication(
            Arc::clone(&local),
            peer.clone(),
            quick_options().retry(false),
        );

        let event = handle.events().recv().await;
        assert!(matches!(event, Some(ReplicationEvent::Fatal(_))), "{:?}", event);
        assert_eq!(handle.current_status(), ReplicationStatus::Stopped);
        assert_eq!(peer.pushed.load(Ordering::SeqCst), 0);
        assert_eq!(local.checkpoint(handle.replication_id()).source_seq, 0);
    }

    #[tokio::test]
    async fn test_fatal_peer_error_is_reported_once() {
        let local = Arc::new(Store::new("local"));
        let mut handle = start_replication(
            Arc::clone(&local),
            Arc::new(RejectingPeer),
            quick_options().live(true),
        );

        let event = tokio::time::timeout(Duration::from_secs(5), handle.events().recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(ReplicationEvent::Fatal(
                "Fatal peer error: 401 Unauthorized".to_string()
            ))
        );
        assert_eq!(handle.events().recv().await, None);
        assert_eq!(handle.current_status(), ReplicationStatus::Stopped);

        // Local CRUD is unaffected.
        local.put(Document::new("still-works", json!({})), None).unwrap();
        assert!(local.get("still-works").is_ok());
    }
}

#[cfg(test)]
mod checkpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_replaying_a_pull_is_idempotent() {
        let local = Arc::new(Store::new("local"));
        let remote = Arc::new(Store::new("remote"));
        seed(&remote, "r", 4);
        local.create_index(vec![burrow_engine::IndexField::asc("i")]).unwrap();

        let first = Replicator::new(
            Arc::clone(&local),
            Arc::new(LocalPeer::new(Arc::clone(&remote))),
            ReplicationOptions::new(),
        );
        let stats = first.replicate_once(Direction::Pull).await.unwrap();
        assert_eq!(stats.docs_written, 4);
        let last_seq = local.last_seq();

        // A second pairing starts from an empty checkpoint, as if the first
        // crashed before persisting it.
        let replay = Replicator::new(
            Arc::clone(&local),
            Arc::new(LocalPeer::with_endpoint(Arc::clone(&remote), "replay")),
            ReplicationOptions::new(),
        );
        let stats = replay.replicate_once(Direction::Pull).await.unwrap();
        assert_eq!(stats.docs_read, 4);
        assert_eq!(stats.docs_written, 0);
        assert_eq!(local.last_seq(), last_seq);

        let page = local
            .find(&burrow_engine::Query::new().sort_asc("i"))
            .unwrap();
        assert_eq!(page.docs.len(), 4);
    }

    #[tokio::test]
    async fn test_peers_keep_independent_checkpoints() {
        let local = Arc::new(Store::new("local"));
        let first = Arc::new(Store::new("first"));
        let second = Arc::new(Store::new("second"));
        seed(&local, "doc", 3);

        let to_first = Replicator::new(
            Arc::clone(&local),
            Arc::new(LocalPeer::new(Arc::clone(&first))),
            ReplicationOptions::new(),
        );
        let to_second = Replicator::new(
            Arc::clone(&local),
            Arc::new(LocalPeer::new(Arc::clone(&second))),
            ReplicationOptions::new(),
        );
        assert_ne!(to_first.replication_id(), to_second.replication_id());

        to_first.replicate_once(Direction::Push).await.unwrap();
        assert_eq!(to_first.checkpoint().source_seq, 3);
        assert_eq!(to_second.checkpoint().source_seq, 0);

        seed(&local, "more", 2);
        let (a, b) = tokio::join!(
            to_first.replicate_once(Direction::Push),
            to_second.replicate_once(Direction::Push)
        );
        assert_eq!(a.unwrap().docs_written, 2);
        assert_eq!(b.unwrap().docs_written, 5);
        assert_eq!(to_first.checkpoint().source_seq, 5);
        assert_eq!(to_second.checkpoint().source_seq, 5);
        assert_eq!(first.doc_count(), 5);
        assert_eq!(second.doc_count(), 5);
    }

    #[tokio::test]
    async fn test_checkpoint_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::persistent("local", dir.path());
        let remote = Arc::new(Store::new("remote"));

        {
            let local = Arc::new(Store::open(config.clone()).unwrap());
            seed(&local, "doc", 3);
            let replicator = Replicator::new(
                local,
                Arc::new(LocalPeer::new(Arc::clone(&remote))),
                ReplicationOptions::new(),
            );
            replicator.replicate_once(Direction::Push).await.unwrap();
        }

        let local = Arc::new(Store::open(config).unwrap());
        let replicator = Replicator::new(
            local,
            Arc::new(LocalPeer::new(Arc::clone(&remote))),
            ReplicationOptions::new(),
        );
        assert_eq!(replicator.checkpoint().source_seq, 3);
        let stats = replicator.replicate_once(Direction::Push).await.unwrap();
        assert_eq!(stats.docs_read, 0);
    }
}

#[cfg(test)]
mod convergence_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_edits_converge() {
        let a = Arc::new(Store::new("a"));
        let b = Arc::new(Store::new("b"));
        let rev1 = a.put(Document::new("doc", json!({"v": 0})), None).unwrap().rev;

        let sync = Replicator::new(
            Arc::clone(&a),
            Arc::new(LocalPeer::new(Arc::clone(&b))),
            ReplicationOptions::new(),
        );
        sync.replicate_once(Direction::Both).await.unwrap();
        assert_eq!(b.get("doc").unwrap().rev, Some(rev1.clone()));

        a.put(Document::new("doc", json!({"v": "a"})), Some(&rev1)).unwrap();
        b.put(Document::new("doc", json!({"v": "b"})), Some(&rev1)).unwrap();

        sync.replicate_once(Direction::Both).await.unwrap();

        let winner_a = a.get("doc").unwrap();
        let winner_b = b.get("doc").unwrap();
        assert_eq!(winner_a.rev, winner_b.rev);
        assert_eq!(winner_a.body, winner_b.body);
        assert_eq!(a.list_conflicts("doc").unwrap().len(), 1);
        assert_eq!(a.list_conflicts("doc").unwrap(), b.list_conflicts("doc").unwrap());
    }

    #[tokio::test]
    async fn test_tombstones_replicate() {
        let a = Arc::new(Store::new("a"));
        let b = Arc::new(Store::new("b"));
        let rev = a.put(Document::new("gone", json!({})), None).unwrap().rev;
        a.remove("gone", &rev).unwrap();

        let sync = Replicator::new(
            Arc::clone(&a),
            Arc::new(LocalPeer::new(Arc::clone(&b))),
            ReplicationOptions::new(),
        );
        let stats = sync.replicate_once(Direction::Push).await.unwrap();
        assert_eq!(stats.docs_read, 2);
        assert!(matches!(b.get("gone"), Err(burrow_engine::Error::NotFound(_))));
        assert_eq!(b.changes_since(0, 10).last().map(|e| e.deleted), Some(true));
    }
}

#[cfg(test)]
mod live_tests {
    use super::*;

    #[tokio::test]
    async fn test_live_session_follows_both_sides() {
        let local = Arc::new(Store::new("local"));
        let remote = Arc::new(Store::new("remote"));

        let handle = start_replication(
            Arc::clone(&local),
            Arc::new(LocalPeer::new(Arc::clone(&remote))),
            quick_options()
                .live(true)
                .longpoll_timeout(Duration::from_millis(200)),
        );
        let mut status = handle.status();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| *s == ReplicationStatus::Paused),
        )
        .await
        .unwrap()
        .unwrap();

        local.put(Document::new("from-local", json!({})), None).unwrap();
        wait_until(|| remote.get("from-local").is_ok()).await;

        remote.put(Document::new("from-remote", json!({})), None).unwrap();
        wait_until(|| local.get("from-remote").is_ok()).await;

        stop_replication(handle).await;
        assert_eq!(*status.borrow(), ReplicationStatus::Stopped);

        // Nothing flows after the stop.
        local.put(Document::new("after-stop", json!({})), None).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(remote.get("after-stop").is_err());
    }
}
