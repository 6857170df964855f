//! Changes handler - serves the change feed to replicating peers.

use burrow_engine::{ChangesResponse, Store};
use serde::Deserialize;
use std::time::Duration;

/// How the changes request waits for new entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Answer immediately, possibly with an empty page
    #[default]
    Normal,
    /// Hold the request until an entry arrives or the timeout expires
    Longpoll,
}

/// Query parameters for a changes request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesQuery {
    /// Return entries after this sequence (0 for the whole feed)
    pub since: Option<u64>,
    /// Maximum number of entries to return
    pub limit: Option<usize>,
    #[serde(default)]
    pub feed: FeedMode,
    /// Longpoll wait in milliseconds
    pub timeout: Option<u64>,
}

/// Default limit for changes requests.
pub const DEFAULT_LIMIT: usize = 100;

/// Default longpoll wait.
pub const DEFAULT_LONGPOLL_MS: u64 = 30_000;

/// Maximum longpoll wait.
pub const MAX_LONGPOLL_MS: u64 = 60_000;

/// Read one page of the change feed.
pub async fn handle_changes(store: &Store, max_limit: usize, query: ChangesQuery) -> ChangesResponse {
    let since = query.since.unwrap_or(0);
    let limit = query
        .limit
        .map(|l| l.clamp(1, max_limit))
        .unwrap_or_else(|| DEFAULT_LIMIT.min(max_limit));

    let mut results = store.changes_since(since, limit);

    if results.is_empty() && query.feed == FeedMode::Longpoll {
        let wait = Duration::from_millis(query.timeout.unwrap_or(DEFAULT_LONGPOLL_MS).min(MAX_LONGPOLL_MS));
        let arrived = tokio::time::timeout(wait, store.wait_for_change(since))
            .await
            .unwrap_or(false);
        if arrived {
            results = store.changes_since(since, limit);
        }
    }

    let last_seq = results.last().map_or(since, |entry| entry.seq);
    tracing::debug!(since, returned = results.len(), last_seq, "served changes");

    ChangesResponse { results, last_seq }
}
