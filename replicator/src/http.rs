//! A peer reached over the HTTP replication API.

use crate::error::{ReplicationError, Result};
use crate::peer::Peer;
use async_trait::async_trait;
use burrow_engine::{
    BulkDocsRequest, BulkDocsResponse, ChangesResponse, PeerInfo, RevId, RevisionPayload,
    RevsDiffRequest, RevsDiffResponse, Sequence,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for a remote peer.
#[derive(Debug, Clone)]
pub struct HttpPeer {
    client: Client,
    base: Url,
    endpoint: String,
    timeout: Duration,
}

impl HttpPeer {
    /// Create a client for `endpoint` (e.g. `http://host:5984`) with a
    /// per-request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| ReplicationError::Fatal(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(ReplicationError::Fatal(format!("invalid endpoint '{}'", endpoint)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplicationError::Fatal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// URL for `segments` below the base path. Segments are percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        response.json::<T>().await.map_err(classify_transport)
    }
}

/// Classify a failure to reach the peer or read its response.
fn classify_transport(error: reqwest::Error) -> ReplicationError {
    if error.is_decode() || error.is_builder() {
        ReplicationError::Fatal(error.to_string())
    } else {
        ReplicationError::Transient(error.to_string())
    }
}

/// Classify an unsuccessful HTTP status.
fn classify_status(status: StatusCode, body: &str) -> ReplicationError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ReplicationError::Fatal(format!("peer rejected credentials ({})", message))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ReplicationError::Transient(message)
        }
        s if s.is_server_error() => ReplicationError::Transient(message),
        _ => ReplicationError::Fatal(message),
    }
}

#[async_trait]
impl Peer for HttpPeer {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn info(&self) -> Result<PeerInfo> {
        self.send(self.client.get(self.url(&[]))).await
    }

    async fn changes(
        &self,
        since: Sequence,
        limit: usize,
        wait: Option<Duration>,
    ) -> Result<ChangesResponse> {
        let mut request = self
            .client
            .get(self.url(&["changes"]))
            .query(&[("since", since.to_string()), ("limit", limit.to_string())]);
        if let Some(wait) = wait {
            request = request
                .query(&[("feed", "longpoll".to_string()), ("timeout", wait.as_millis().to_string())])
                .timeout(self.timeout + wait);
        }
        self.send(request).await
    }

    async fn revs_diff(&self, offered: &RevsDiffRequest) -> Result<RevsDiffResponse> {
        self.send(self.client.post(self.url(&["revs_diff"])).json(offered))
            .await
    }

    async fn fetch_revision(&self, id: &str, rev: &RevId) -> Result<RevisionPayload> {
        let request = self
            .client
            .get(self.url(&["doc", id]))
            .query(&[("rev", rev.to_string())]);
        self.send(request).await
    }

    async fn bulk_docs(&self, docs: Vec<RevisionPayload>) -> Result<BulkDocsResponse> {
        let body = BulkDocsRequest { docs };
        self.send(self.client.post(self.url(&["doc"])).json(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            ReplicationError::Fatal(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            ReplicationError::Fatal(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad"),
            ReplicationError::Fatal(_)
        ));
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, "disk").is_transient());
    }

    #[test]
    fn urls_encode_document_ids() {
        let peer = HttpPeer::new("http://localhost:5984/", Duration::from_secs(1)).unwrap();
        assert_eq!(peer.endpoint(), "http://localhost:5984");
        assert_eq!(
            peer.url(&["doc", "notes/2024"]).as_str(),
            "http://localhost:5984/doc/notes%2F2024"
        );

        let nested = HttpPeer::new("http://localhost:5984/db", Duration::from_secs(1)).unwrap();
        assert_eq!(nested.url(&["changes"]).as_str(), "http://localhost:5984/db/changes");
    }

    #[test]
    fn rejects_invalid_endpoints() {
        assert!(matches!(
            HttpPeer::new("not a url", Duration::from_secs(1)),
            Err(ReplicationError::Fatal(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_peer_is_transient() {
        // Port 9 (discard) is closed on test machines.
        let peer = HttpPeer::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = peer.info().await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }
}
