//! # Burrow Engine
//!
//! The storage and query core of a local-first document store.
//!
//! Documents are schema-less JSON objects kept as trees of immutable
//! revisions. Concurrent edits made on different replicas become sibling
//! branches of the tree and are resolved by a deterministic winner rule, so
//! replicas that exchange the same revisions converge on the same state
//! without coordination.
//!
//! ## Design Principles
//!
//! - **Deterministic**: the winning revision depends only on the set of
//!   revisions a replica holds, never on arrival order
//! - **Append-only history**: every commit gets a gap-free change feed
//!   sequence, which replication uses as its cursor
//! - **Index-backed queries**: `find` never sorts in memory; it scans an
//!   index whose key order matches the requested sort
//! - **No network I/O**: peers and transports live in `burrow-replicator`
//!
//! ## Core Concepts
//!
//! ### Revisions
//!
//! Each write creates a [`RevId`] of the form `"{depth}-{hash}"`. The hash
//! covers the parent revision and the new content, so the same edit made on
//! the same parent produces the same id everywhere. See [`tree`] for the
//! winner rule.
//!
//! ### Change Feed
//!
//! Every committed revision, including conflict losers and tombstones, is
//! appended to the [`ChangeFeed`]. [`Store::subscribe`] returns a
//! [`Subscription`] that yields entries in commit order.
//!
//! ### Indexes and Queries
//!
//! [`Store::create_index`] declares an ordered field tuple. [`Store::find`]
//! picks an index able to serve the query's sort, range-scans it and filters
//! the rest of the selector.
//!
//! ## Quick Start
//!
//! ```rust
//! use burrow_engine::{Condition, Document, IndexField, Query, Store};
//! use serde_json::json;
//!
//! let store = Store::new("device-1");
//! store.create_index(vec![IndexField::desc("likes")]).unwrap();
//!
//! let first = store
//!     .put(Document::new("post-1", json!({"title": "Hello", "likes": 3})), None)
//!     .unwrap();
//! store
//!     .put(Document::new("post-2", json!({"title": "World", "likes": 8})), None)
//!     .unwrap();
//!
//! // Updates name the revision they replace.
//! store
//!     .put(
//!         Document::new("post-1", json!({"title": "Hello", "likes": 10})),
//!         Some(&first.rev),
//!     )
//!     .unwrap();
//!
//! let page = store
//!     .find(&Query::new().filter("likes", Condition::gte(0)).sort_desc("likes"))
//!     .unwrap();
//! let ids: Vec<_> = page.docs.iter().map(|d| d.id.as_str()).collect();
//! assert_eq!(ids, vec!["post-1", "post-2"]);
//! assert_eq!(store.last_seq(), 3);
//! ```
//!
//! ## Persistence
//!
//! [`Store::open`] with [`StoreConfig::persistent`] keeps a JSON-lines
//! journal plus metadata files in a directory. [`Store::compact`] folds the
//! journal into a snapshot. [`Store::export_state`] and
//! [`Store::import_state`] move whole stores as [`StoreSnapshot`]s.

pub mod checkpoint;
pub mod collate;
pub mod document;
pub mod error;
pub mod feed;
pub mod index;
mod journal;
pub mod protocol;
pub mod query;
pub mod rev;
pub mod snapshot;
pub mod store;
pub mod tree;

// Re-export main types at crate root
pub use checkpoint::{replication_id, Checkpoint, CheckpointStore};
pub use document::{Attachment, Document};
pub use error::{Error, Result};
pub use feed::{ChangeEntry, ChangeFeed, Subscription};
pub use index::{Direction, IndexDef, IndexField, IndexManager, IndexPlan};
pub use journal::JournalRecord;
pub use protocol::{
    BulkDocsError, BulkDocsRequest, BulkDocsResponse, ChangesResponse, PeerInfo,
    RevisionPayload, RevsDiffRequest, RevsDiffResponse,
};
pub use query::{Condition, Page, Query, Selector, SortField};
pub use rev::RevId;
pub use snapshot::{SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{ForeignApply, PutResult, Store, StoreConfig};
pub use tree::{RevNode, RevTree};

/// Type aliases for clarity
pub type DocId = String;
pub type NodeId = String;
pub type Sequence = u64;
