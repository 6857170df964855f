//! Replication options.

use crate::backoff::BackoffPolicy;
use crate::replicator::Direction;
use std::time::Duration;

/// How a replication session runs.
#[derive(Debug, Clone)]
pub struct ReplicationOptions {
    /// Keep running after catching up, reacting to new changes on either side
    pub live: bool,
    /// Retry transient failures with backoff instead of ending the session
    pub retry: bool,
    /// Stop retrying after this many consecutive failures (unbounded when `None`)
    pub max_retries: Option<u32>,
    pub direction: Direction,
    /// Change entries per page, in both directions
    pub batch_size: usize,
    /// Timeout for every peer call
    pub request_timeout: Duration,
    /// How long a live session long-polls the peer's change feed
    pub longpoll_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for ReplicationOptions {
    fn default() -> Self {
        Self {
            live: false,
            retry: true,
            max_retries: None,
            direction: Direction::Both,
            batch_size: 100,
            request_timeout: Duration::from_secs(10),
            longpoll_timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ReplicationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Page size; zero is raised to one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn longpoll_timeout(mut self, timeout: Duration) -> Self {
        self.longpoll_timeout = timeout;
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}
