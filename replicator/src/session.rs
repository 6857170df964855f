//! Replication sessions: a [`Replicator`] driven in the background.
//!
//! A session connects, pulls, pushes and then either finishes (one-shot) or
//! parks until either side has new changes (live). Transient failures pause
//! the session and retry with backoff; anything else stops it and is
//! reported once on the event channel. The session belongs to its
//! [`ReplicationHandle`]: stopping or dropping the handle cancels it.

use crate::config::ReplicationOptions;
use crate::error::{ReplicationError, Result};
use crate::http::HttpPeer;
use crate::peer::Peer;
use crate::replicator::{ReplicationStats, Replicator};
use burrow_engine::Store;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Where a session is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationStatus {
    /// Not started, or a one-shot session that finished
    Idle,
    Connecting,
    Pulling,
    Pushing,
    /// Caught up in live mode, or waiting to retry
    Paused,
    /// Terminal
    Stopped,
}

/// Notable outcomes, each delivered once.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationEvent {
    /// A one-shot session caught up and finished.
    Completed(ReplicationStats),
    /// The session ended on an error that retrying cannot fix.
    Fatal(String),
}

/// Owner's handle on a running session.
#[derive(Debug)]
pub struct ReplicationHandle {
    replication_id: String,
    status: Arc<watch::Sender<ReplicationStatus>>,
    events: mpsc::UnboundedReceiver<ReplicationEvent>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReplicationHandle {
    pub fn replication_id(&self) -> &str {
        &self.replication_id
    }

    /// A receiver that observes every status change.
    pub fn status(&self) -> watch::Receiver<ReplicationStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> ReplicationStatus {
        *self.status.borrow()
    }

    /// Completion and fatal error events.
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<ReplicationEvent> {
        &mut self.events
    }

    /// Whether the background task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the session and wait for it to wind down.
    ///
    /// In-flight peer calls are abandoned; checkpoints keep the last fully
    /// transferred page.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::error!(replication_id = %self.replication_id, "replication task panicked");
            }
        }
        self.status.send_replace(ReplicationStatus::Stopped);
        tracing::info!(replication_id = %self.replication_id, "replication stopped");
    }
}

/// Start replicating `store` with `peer` in the background.
///
/// Must be called within a Tokio runtime.
pub fn start_replication(
    store: Arc<Store>,
    peer: Arc<dyn Peer>,
    options: ReplicationOptions,
) -> ReplicationHandle {
    let replicator = Replicator::new(store, peer, options);
    let replication_id = replicator.replication_id().to_string();

    let status = Arc::new(watch::Sender::new(ReplicationStatus::Idle));
    let (events_tx, events) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = watch::channel(false);

    tracing::info!(
        replication_id = %replication_id,
        endpoint = %replicator.peer().endpoint(),
        live = replicator.options().live,
        "starting replication"
    );

    let session = Session {
        replicator,
        status: Arc::clone(&status),
        events: events_tx,
    };
    let task = tokio::spawn(session.run(shutdown_rx));

    ReplicationHandle {
        replication_id,
        status,
        events,
        shutdown,
        task,
    }
}

/// Start replicating `store` with the HTTP peer at `endpoint`.
pub fn start_http_replication(
    store: Arc<Store>,
    endpoint: &str,
    options: ReplicationOptions,
) -> Result<ReplicationHandle> {
    let peer = HttpPeer::new(endpoint, options.request_timeout)?;
    Ok(start_replication(store, Arc::new(peer), options))
}

/// Stop a session started with [`start_replication`].
pub async fn stop_replication(handle: ReplicationHandle) {
    handle.stop().await
}

/// Run `work` unless the session is stopped first.
///
/// A dropped handle counts as a stop.
async fn until_stopped<T>(
    shutdown: &mut watch::Receiver<bool>,
    work: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = shutdown.wait_for(|stop| *stop) => None,
        value = work => Some(value),
    }
}

struct Session {
    replicator: Replicator,
    status: Arc<watch::Sender<ReplicationStatus>>,
    events: mpsc::UnboundedSender<ReplicationEvent>,
}

impl Session {
    fn set(&self, status: ReplicationStatus) {
        self.status.send_replace(status);
    }

    fn emit(&self, event: ReplicationEvent) {
        // The handle may already be gone.
        let _ = self.events.send(event);
    }

    /// Pull then push until caught up.
    async fn pass(&self) -> Result<ReplicationStats> {
        let direction = self.replicator.options().direction;
        let mut stats = self.replicator.initial_stats();
        if direction.pulls() {
            self.set(ReplicationStatus::Pulling);
            self.replicator.pull(&mut stats).await?;
        }
        if direction.pushes() {
            self.set(ReplicationStatus::Pushing);
            self.replicator.push(&mut stats).await?;
        }
        Ok(stats)
    }

    /// Park until the local store or the peer has something new.
    async fn wait_for_changes(&self) -> Result<()> {
        let direction = self.replicator.options().direction;
        tokio::select! {
            _ = self.replicator.wait_local(), if direction.pushes() => Ok(()),
            result = self.replicator.wait_remote(), if direction.pulls() => result,
            else => Ok(()),
        }
    }

    /// Decide whether to continue after a failure, sleeping out the backoff.
    async fn recover(
        &self,
        error: ReplicationError,
        failures: &mut u32,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let options = self.replicator.options();
        let retry = error.is_transient()
            && options.retry
            && options.max_retries.map_or(true, |max| *failures < max);
        if !retry {
            tracing::error!(
                replication_id = %self.replicator.replication_id(),
                "replication failed: {}",
                error
            );
            self.set(ReplicationStatus::Stopped);
            self.emit(ReplicationEvent::Fatal(error.to_string()));
            return false;
        }

        let delay = options.backoff.delay(*failures);
        *failures += 1;
        tracing::warn!(
            replication_id = %self.replicator.replication_id(),
            attempt = *failures,
            delay_ms = delay.as_millis() as u64,
            "replication paused: {}",
            error
        );
        self.set(ReplicationStatus::Paused);
        until_stopped(shutdown, tokio::time::sleep(delay)).await.is_some()
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let live = self.replicator.options().live;
        let mut failures = 0u32;
        let mut connected = false;

        loop {
            if !connected {
                self.set(ReplicationStatus::Connecting);
                match until_stopped(&mut shutdown, self.replicator.connect()).await {
                    None => break,
                    Some(Ok(_)) => connected = true,
                    Some(Err(e)) => {
                        if !self.recover(e, &mut failures, &mut shutdown).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            let outcome = match until_stopped(&mut shutdown, self.pass()).await {
                None => break,
                Some(outcome) => outcome,
            };
            let stats = match outcome {
                Ok(stats) => stats,
                Err(e) => {
                    connected = false;
                    if !self.recover(e, &mut failures, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };
            failures = 0;

            if !live {
                self.set(ReplicationStatus::Idle);
                self.emit(ReplicationEvent::Completed(stats));
                return;
            }

            self.set(ReplicationStatus::Paused);
            match until_stopped(&mut shutdown, self.wait_for_changes()).await {
                None => break,
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    connected = false;
                    if !self.recover(e, &mut failures, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        self.set(ReplicationStatus::Stopped);
    }
}
