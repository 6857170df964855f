//! The change feed: an append-only, gap-free log of committed revisions.
//!
//! Appends are serialized by a single mutex, which is the only global
//! critical section on the write path. Live subscribers are woken through a
//! `tokio::sync::watch` channel carrying the latest committed sequence.

use crate::{error::Result, DocId, RevId, Sequence};
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

/// Entries fetched per refill of a subscription buffer.
const SUBSCRIPTION_BATCH: usize = 256;

/// One committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub seq: Sequence,
    pub id: DocId,
    pub rev: RevId,
    #[serde(default)]
    pub deleted: bool,
}

/// In-memory change log. Entry `i` carries sequence `i + 1`.
#[derive(Debug)]
pub struct ChangeFeed {
    entries: Mutex<Vec<ChangeEntry>>,
    head: watch::Sender<Sequence>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (head, _) = watch::channel(0);
        Self {
            entries: Mutex::new(Vec::new()),
            head,
        }
    }

    /// Replace the log with persisted entries, which must be gap-free from 1.
    pub(crate) fn restore(&self, restored: Vec<ChangeEntry>) {
        let last = restored.last().map_or(0, |e| e.seq);
        *self.entries.lock() = restored;
        self.publish(last);
    }

    /// Allocate the next sequence and append an entry for it.
    ///
    /// `persist` runs under the feed lock with the allocated sequence before
    /// the entry becomes visible; if it fails, nothing is appended. Readers
    /// see the entry immediately, live subscribers only after [`publish`].
    ///
    /// [`publish`]: ChangeFeed::publish
    pub(crate) fn append<F>(&self, id: &str, rev: &RevId, deleted: bool, persist: F) -> Result<Sequence>
    where
        F: FnOnce(Sequence) -> Result<()>,
    {
        let mut entries = self.entries.lock();
        let seq = entries.len() as Sequence + 1;
        persist(seq)?;
        entries.push(ChangeEntry {
            seq,
            id: id.to_string(),
            rev: rev.clone(),
            deleted,
        });
        Ok(seq)
    }

    /// Wake live subscribers up to `seq`.
    pub(crate) fn publish(&self, seq: Sequence) {
        self.head.send_modify(|head| *head = (*head).max(seq));
    }

    /// Highest appended sequence (0 when empty).
    pub fn last_seq(&self) -> Sequence {
        self.entries.lock().len() as Sequence
    }

    /// Entries with sequence greater than `since`, ascending, at most `limit`.
    pub fn read_since(&self, since: Sequence, limit: usize) -> Vec<ChangeEntry> {
        let entries = self.entries.lock();
        let start = usize::try_from(since).unwrap_or(usize::MAX).min(entries.len());
        entries[start..].iter().take(limit).cloned().collect()
    }

    /// Every entry, for snapshots.
    pub(crate) fn entries(&self) -> Vec<ChangeEntry> {
        self.entries.lock().clone()
    }

    /// Subscribe to entries after `since`.
    pub fn subscribe(self: &Arc<Self>, since: Sequence) -> Subscription {
        Subscription {
            feed: Arc::clone(self),
            cursor: since,
            head: self.head.subscribe(),
            buffer: VecDeque::new(),
        }
    }

    /// Wait until the feed holds an entry after `since`.
    ///
    /// Returns `false` if the feed shut down first.
    pub async fn wait_for(&self, since: Sequence) -> bool {
        let mut head = self.head.subscribe();
        let woke = head.wait_for(|seq| *seq > since).await.is_ok();
        woke
    }
}

/// A live, restartable cursor over the change feed.
///
/// Entries are delivered in commit order starting after the sequence the
/// subscription was opened at. Dropping the subscription (or calling
/// [`unsubscribe`](Subscription::unsubscribe)) releases its receiver.
#[derive(Debug)]
pub struct Subscription {
    feed: Arc<ChangeFeed>,
    cursor: Sequence,
    head: watch::Receiver<Sequence>,
    buffer: VecDeque<ChangeEntry>,
}

impl Subscription {
    /// Sequence of the last entry handed out.
    pub fn cursor(&self) -> Sequence {
        self.cursor
    }

    fn take_buffered(&mut self) -> Option<ChangeEntry> {
        let entry = self.buffer.pop_front()?;
        self.cursor = entry.seq;
        Some(entry)
    }

    fn refill(&mut self) -> bool {
        let last = self.buffer.back().map_or(self.cursor, |e| e.seq);
        let fresh = self.feed.read_since(last, SUBSCRIPTION_BATCH);
        let found = !fresh.is_empty();
        self.buffer.extend(fresh);
        found
    }

    /// Next entry if one is already committed.
    pub fn try_next(&mut self) -> Option<ChangeEntry> {
        if self.buffer.is_empty() {
            self.head.borrow_and_update();
            self.refill();
        }
        self.take_buffered()
    }

    /// Wait for the next entry.
    ///
    /// Returns `None` only if the feed has been dropped.
    pub async fn next(&mut self) -> Option<ChangeEntry> {
        loop {
            if let Some(entry) = self.try_next() {
                return Some(entry);
            }
            if self.head.changed().await.is_err() {
                // Sender gone: drain whatever is left.
                return self.refill().then(|| self.take_buffered()).flatten();
            }
        }
    }

    /// Convert into a `Stream` of entries.
    pub fn into_stream(self) -> impl Stream<Item = ChangeEntry> {
        futures::stream::unfold(self, |mut sub| async move {
            let entry = sub.next().await?;
            Some((entry, sub))
        })
    }

    /// End the subscription.
    pub fn unsubscribe(self) {
        tracing::trace!(cursor = self.cursor, "change subscription closed");
    }
}
