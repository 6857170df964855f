//! # Burrow Replicator
//!
//! Bidirectional, resumable replication between a local
//! [`Store`](burrow_engine::Store) and a peer.
//!
//! ## Overview
//!
//! - **Pull** reads the peer's change feed after the stored target
//!   checkpoint, fetches the revisions the local store is missing and grafts
//!   them in. The checkpoint moves only after a whole page is stored.
//! - **Push** reads the local change feed after the stored source
//!   checkpoint, asks the peer which revisions it lacks and sends them. The
//!   checkpoint moves only after the peer acknowledges the batch.
//! - **Sessions** run passes in the background, optionally live, retrying
//!   transient failures with exponential backoff.
//!
//! Checkpoints are keyed by (local node, peer endpoint), so sessions against
//! different peers never share progress.
//!
//! ## Quick Start
//!
//! ```rust
//! use burrow_engine::{Document, Store};
//! use burrow_replicator::{Direction, LocalPeer, ReplicationOptions, Replicator};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let phone = Arc::new(Store::new("phone"));
//! let server = Arc::new(Store::new("server"));
//! phone.put(Document::new("note", json!({"text": "offline edit"})), None).unwrap();
//!
//! let replicator = Replicator::new(
//!     Arc::clone(&phone),
//!     Arc::new(LocalPeer::new(Arc::clone(&server))),
//!     ReplicationOptions::new(),
//! );
//! let stats = replicator.replicate_once(Direction::Both).await.unwrap();
//!
//! assert_eq!(stats.docs_written, 1);
//! assert_eq!(server.get("note").unwrap().body["text"], "offline edit");
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod http;
pub mod local;
pub mod peer;
pub mod replicator;
pub mod session;

pub use backoff::BackoffPolicy;
pub use config::ReplicationOptions;
pub use error::{ReplicationError, Result};
pub use http::HttpPeer;
pub use local::LocalPeer;
pub use peer::Peer;
pub use replicator::{Direction, ReplicationStats, Replicator};
pub use session::{
    start_http_replication, start_replication, stop_replication, ReplicationEvent,
    ReplicationHandle, ReplicationStatus,
};
