//! A peer backed by another store in the same process.

use crate::error::{ReplicationError, Result};
use crate::peer::Peer;
use async_trait::async_trait;
use burrow_engine::{
    BulkDocsError, BulkDocsResponse, ChangesResponse, ForeignApply, PeerInfo, RevId,
    RevisionPayload, RevsDiffRequest, RevsDiffResponse, Sequence, Store,
};
use std::sync::Arc;
use std::time::Duration;

/// Replicates directly against a [`Store`].
#[derive(Debug, Clone)]
pub struct LocalPeer {
    store: Arc<Store>,
    endpoint: String,
}

impl LocalPeer {
    /// The endpoint defaults to `local:{node_id}`.
    pub fn new(store: Arc<Store>) -> Self {
        let endpoint = format!("local:{}", store.node_id());
        Self { store, endpoint }
    }

    pub fn with_endpoint(store: Arc<Store>, endpoint: impl Into<String>) -> Self {
        Self {
            store,
            endpoint: endpoint.into(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

#[async_trait]
impl Peer for LocalPeer {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn info(&self) -> Result<PeerInfo> {
        Ok(PeerInfo {
            node_id: self.store.node_id().clone(),
            last_seq: self.store.last_seq(),
        })
    }

    async fn changes(
        &self,
        since: Sequence,
        limit: usize,
        wait: Option<Duration>,
    ) -> Result<ChangesResponse> {
        let mut results = self.store.changes_since(since, limit);
        if let (true, Some(wait)) = (results.is_empty(), wait) {
            if let Ok(true) = tokio::time::timeout(wait, self.store.wait_for_change(since)).await {
                results = self.store.changes_since(since, limit);
            }
        }
        let last_seq = results.last().map_or(since, |entry| entry.seq);
        Ok(ChangesResponse { results, last_seq })
    }

    async fn revs_diff(&self, offered: &RevsDiffRequest) -> Result<RevsDiffResponse> {
        Ok(self.store.revs_diff(offered))
    }

    async fn fetch_revision(&self, id: &str, rev: &RevId) -> Result<RevisionPayload> {
        self.store
            .revision_payload(id, Some(rev))
            .map_err(ReplicationError::from_remote)
    }

    async fn bulk_docs(&self, docs: Vec<RevisionPayload>) -> Result<BulkDocsResponse> {
        let mut response = BulkDocsResponse::default();
        for payload in docs {
            let id = payload.doc.id.clone();
            let rev = payload.rev().cloned();
            match self.store.apply_foreign_revision(payload) {
                Ok(ForeignApply::Applied(_)) => response.ok += 1,
                Ok(ForeignApply::AlreadyPresent) => {}
                Err(e @ burrow_engine::Error::Storage(_)) => {
                    return Err(ReplicationError::from_remote(e))
                }
                Err(e) => response.errors.push(BulkDocsError {
                    id,
                    rev,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_engine::Document;
    use serde_json::json;

    #[tokio::test]
    async fn changes_wait_returns_new_entries() {
        let store = Arc::new(Store::new("remote"));
        let peer = LocalPeer::new(Arc::clone(&store));
        assert_eq!(peer.endpoint(), "local:remote");

        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.put(Document::new("a", json!({})), None).unwrap();
        });

        let page = peer.changes(0, 10, Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.last_seq, 1);
    }

    #[tokio::test]
    async fn missing_revision_is_fatal() {
        let peer = LocalPeer::new(Arc::new(Store::new("remote")));
        let err = peer
            .fetch_revision("nope", &RevId::new(1, "a".repeat(64)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplicationError::Fatal(_)));
    }
}
