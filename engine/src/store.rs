//! Store - the revision store and the owner of every other engine component.
//!
//! Each document lives behind its own mutex, so writers to different ids run
//! concurrently. A commit holds the document lock, allocates a sequence from
//! the change feed (journaling the new revision under the feed lock), grafts
//! the revision into the tree, and refreshes every index before releasing the
//! document. Queries only take the index read lock.
//!
//! Lock order: commit gate, document, change feed, indexes.

use crate::{
    checkpoint::{Checkpoint, CheckpointStore},
    error::{Error, Result},
    feed::{ChangeEntry, ChangeFeed, Subscription},
    index::{Index, IndexDef, IndexField, IndexManager},
    journal::{write_atomic, Journal, JournalRecord},
    protocol::{RevisionPayload, RevsDiffRequest, RevsDiffResponse},
    query::{self, Page, Query},
    snapshot::{SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION},
    tree::{RevNode, RevTree},
    DocId, Document, NodeId, RevId, Sequence,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const JOURNAL_FILE: &str = "journal.jsonl";
const SNAPSHOT_FILE: &str = "snapshot.json";
const INDEXES_FILE: &str = "indexes.json";
const CHECKPOINTS_FILE: &str = "checkpoints.json";

/// How to open a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Identity of this replica
    pub node_id: NodeId,
    /// Directory for the journal and metadata files; `None` keeps everything
    /// in memory
    pub data_dir: Option<PathBuf>,
    /// `fsync` every journal write
    pub sync_writes: bool,
}

impl StoreConfig {
    pub fn in_memory(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            data_dir: None,
            sync_writes: false,
        }
    }

    pub fn persistent(node_id: impl Into<NodeId>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_id: node_id.into(),
            data_dir: Some(data_dir.into()),
            sync_writes: false,
        }
    }

    /// Builder-style method to enable `fsync` on every commit.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}

/// Result of a local write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutResult {
    /// The document id (generated when the input id was empty)
    pub id: DocId,
    /// The new revision
    pub rev: RevId,
    /// Change feed sequence of the commit
    pub seq: Sequence,
}

/// Result of grafting a remote revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignApply {
    /// Stored under this sequence
    Applied(Sequence),
    /// The revision was already stored; nothing changed
    AlreadyPresent,
}

/// Per-document state: the revision tree and its materialized winner.
#[derive(Debug, Default)]
struct DocEntry {
    tree: RevTree,
    winner: Option<Arc<Document>>,
}

impl DocEntry {
    /// Recompute the winner, returning the previous one.
    fn refresh_winner(&mut self, id: &DocId) -> Option<Arc<Document>> {
        let winner = self.tree.winner_document(id).map(Arc::new);
        std::mem::replace(&mut self.winner, winner)
    }

    fn live(&self) -> Option<&Arc<Document>> {
        self.winner.as_ref().filter(|doc| !doc.deleted)
    }
}

/// On-disk files of a persistent store.
#[derive(Debug)]
struct Files {
    dir: PathBuf,
    journal: Journal,
    sync: bool,
    /// Serializes metadata file rewrites
    meta: Mutex<()>,
}

impl Files {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| Error::Storage(e.to_string()))?;
        write_atomic(&self.path(name), &json, self.sync)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))
}

/// The local revision store.
#[derive(Debug)]
pub struct Store {
    node_id: NodeId,
    docs: DashMap<DocId, Arc<Mutex<DocEntry>>>,
    feed: Arc<ChangeFeed>,
    indexes: RwLock<IndexManager>,
    checkpoints: CheckpointStore,
    /// Commits share it; snapshotting takes it exclusively
    gate: RwLock<()>,
    files: Option<Files>,
}

impl Store {
    /// Create an empty in-memory store.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            docs: DashMap::new(),
            feed: Arc::new(ChangeFeed::new()),
            indexes: RwLock::new(IndexManager::new()),
            checkpoints: CheckpointStore::new(),
            gate: RwLock::new(()),
            files: None,
        }
    }

    /// Open a store, recovering persisted state when `data_dir` is set.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let Some(dir) = config.data_dir else {
            return Ok(Self::new(config.node_id));
        };
        fs::create_dir_all(&dir)?;

        let snapshot = read_json::<StoreSnapshot>(&dir.join(SNAPSHOT_FILE))?;
        if let Some(snapshot) = &snapshot {
            if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
                return Err(Error::InvalidSnapshot(format!(
                    "unsupported snapshot format version: {}",
                    snapshot.format_version
                )));
            }
            snapshot.validate()?;
        }
        let index_defs = read_json::<Vec<IndexDef>>(&dir.join(INDEXES_FILE))?;
        let checkpoints = read_json(&dir.join(CHECKPOINTS_FILE))?.unwrap_or_default();
        let (journal, records) = Journal::open(&dir.join(JOURNAL_FILE), config.sync_writes)?;

        let mut store = Self::new(config.node_id);
        store.checkpoints = CheckpointStore::from_map(checkpoints);

        let mut defs = index_defs;
        let mut base = 0;
        if let Some(snapshot) = snapshot {
            if snapshot.node_id != store.node_id {
                tracing::warn!(
                    expected = %store.node_id,
                    found = %snapshot.node_id,
                    "snapshot written by a different node id"
                );
            }
            base = snapshot.last_seq;
            // indexes.json wins once written, even when it lists nothing.
            if defs.is_none() {
                defs = Some(snapshot.indexes.clone());
            }
            store.load_trees(snapshot.documents, snapshot.changes);
        }

        let mut replayed = 0usize;
        for record in records.into_iter().filter(|r| r.seq > base) {
            store.replay(record)?;
            replayed += 1;
        }

        store.rebuild_indexes(defs.unwrap_or_default())?;
        store.files = Some(Files {
            dir: dir.clone(),
            journal,
            sync: config.sync_writes,
            meta: Mutex::new(()),
        });

        tracing::info!(
            node_id = %store.node_id,
            dir = %dir.display(),
            docs = store.docs.len(),
            last_seq = store.last_seq(),
            replayed,
            "store opened"
        );
        Ok(store)
    }

    /// Re-apply one journal record during recovery.
    fn replay(&self, record: JournalRecord) -> Result<()> {
        let Some(leaf) = record.nodes.last() else {
            return Err(Error::Storage(format!("empty journal record {}", record.seq)));
        };
        let seq = self.feed.append(&record.id, &leaf.rev, leaf.deleted, |seq| {
            if seq == record.seq {
                Ok(())
            } else {
                Err(Error::Storage(format!(
                    "journal sequence {} does not follow {}",
                    record.seq,
                    seq - 1
                )))
            }
        })?;
        self.feed.publish(seq);

        let slot = self.slot(&record.id);
        let mut entry = slot.lock();
        for node in record.nodes {
            entry.tree.insert(node);
        }
        entry.refresh_winner(&record.id);
        Ok(())
    }

    fn load_trees(&self, documents: impl IntoIterator<Item = (DocId, RevTree)>, changes: Vec<ChangeEntry>) {
        for (id, tree) in documents {
            let mut entry = DocEntry { tree, winner: None };
            entry.refresh_winner(&id);
            self.docs.insert(id, Arc::new(Mutex::new(entry)));
        }
        self.feed.restore(changes);
    }

    fn rebuild_indexes(&self, defs: Vec<IndexDef>) -> Result<()> {
        let mut indexes = IndexManager::new();
        for def in defs {
            indexes.create_index(def)?;
        }
        for slot in self.slots() {
            let entry = slot.lock();
            if let Some(winner) = &entry.winner {
                indexes.on_mutation(winner, None);
            }
        }
        *self.indexes.write() = indexes;
        Ok(())
    }

    /// Get the node ID.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Entry for an id, created empty on first use.
    fn slot(&self, id: &str) -> Arc<Mutex<DocEntry>> {
        if let Some(slot) = self.docs.get(id) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.docs.entry(id.to_string()).or_default().value())
    }

    fn existing(&self, id: &str) -> Option<Arc<Mutex<DocEntry>>> {
        self.docs.get(id).map(|slot| Arc::clone(slot.value()))
    }

    fn slots(&self) -> Vec<Arc<Mutex<DocEntry>>> {
        self.docs.iter().map(|slot| Arc::clone(slot.value())).collect()
    }

    /// Commit new nodes for one document. The last node is the revision the
    /// change feed entry refers to. The caller holds the document lock.
    fn commit(&self, id: &DocId, entry: &mut DocEntry, mut nodes: Vec<RevNode>) -> Result<Sequence> {
        let (rev, deleted) = match nodes.last() {
            Some(leaf) => (leaf.rev.clone(), leaf.deleted),
            None => return Err(Error::InvalidRevision("nothing to commit".into())),
        };

        let seq = self.feed.append(id, &rev, deleted, |seq| {
            if let Some(leaf) = nodes.last_mut() {
                leaf.seq = Some(seq);
            }
            match &self.files {
                Some(files) => files.journal.append(&JournalRecord {
                    seq,
                    id: id.clone(),
                    nodes: nodes.clone(),
                }),
                None => Ok(()),
            }
        })?;

        for node in nodes {
            entry.tree.insert(node);
        }
        let previous = entry.refresh_winner(id);
        {
            let mut indexes = self.indexes.write();
            match &entry.winner {
                Some(winner) => indexes.on_mutation(winner, previous.as_ref()),
                None => indexes.forget(id),
            }
        }
        self.feed.publish(seq);

        tracing::debug!(doc_id = %id, rev = %rev, seq, deleted, "committed revision");
        Ok(seq)
    }

    /// Write a document.
    ///
    /// With `parent`, it must be a current leaf of the document. Without it,
    /// the write is a create and fails if the document exists, unless every
    /// leaf is a tombstone, in which case the new revision extends the
    /// winning tombstone. An empty `doc.id` gets a generated id.
    pub fn put(&self, doc: Document, parent: Option<&RevId>) -> Result<PutResult> {
        doc.validate()?;
        let id = if doc.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            doc.id.clone()
        };

        let _gate = self.gate.read();
        // Only a plain create may add an entry; anything else needs history.
        let slot = match (parent, doc.deleted) {
            (None, false) => self.slot(&id),
            (Some(_), _) => self.existing(&id).ok_or_else(|| Error::Conflict(id.clone()))?,
            (None, true) => self.existing(&id).ok_or_else(|| tombstone_create(&id))?,
        };
        let mut entry = slot.lock();

        let parent = match parent {
            Some(parent) if entry.tree.is_leaf(parent) => Some(parent.clone()),
            Some(_) => return Err(Error::Conflict(id)),
            None => match entry.tree.winner() {
                None => None,
                Some(winner) if winner.deleted => Some(winner.rev.clone()),
                Some(_) => return Err(Error::Conflict(id)),
            },
        };
        if doc.deleted && parent.is_none() {
            return Err(tombstone_create(&id));
        }

        let rev = RevId::compute(parent.as_ref(), doc.deleted, &doc.body, doc.attachment_digests())?;
        let node = RevNode::from_document(&doc, rev.clone(), parent);
        let seq = self.commit(&id, &mut entry, vec![node])?;
        Ok(PutResult { id, rev, seq })
    }

    /// Get the winning revision of a live document.
    pub fn get(&self, id: &str) -> Result<Document> {
        self.existing(id)
            .and_then(|slot| slot.lock().live().map(|doc| (**doc).clone()))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Get any stored revision, including conflict losers and tombstones.
    pub fn get_revision(&self, id: &str, rev: &RevId) -> Result<Document> {
        self.existing(id)
            .and_then(|slot| slot.lock().tree.get(rev).and_then(|node| node.to_document(id)))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Tombstone a live leaf revision.
    pub fn remove(&self, id: &str, rev: &RevId) -> Result<PutResult> {
        let _gate = self.gate.read();
        let slot = self
            .existing(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let mut entry = slot.lock();
        if entry.tree.is_empty() {
            return Err(Error::NotFound(id.to_string()));
        }
        let live_leaf = entry.tree.is_leaf(rev) && entry.tree.get(rev).is_some_and(|n| !n.deleted);
        if !live_leaf {
            return Err(Error::Conflict(id.to_string()));
        }

        let body = serde_json::json!({});
        let new_rev = RevId::compute(Some(rev), true, &body, std::iter::empty())?;
        let mut tombstone = Document::new(id, body);
        tombstone.deleted = true;
        let node = RevNode::from_document(&tombstone, new_rev.clone(), Some(rev.clone()));

        let id = id.to_string();
        let seq = self.commit(&id, &mut entry, vec![node])?;
        Ok(PutResult { id, rev: new_rev, seq })
    }

    /// Live leaves that lost winner selection, best first.
    pub fn list_conflicts(&self, id: &str) -> Result<Vec<RevId>> {
        let slot = self
            .existing(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let entry = slot.lock();
        if entry.tree.is_empty() {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(entry.tree.conflicts())
    }

    /// Graft a revision received from a peer.
    ///
    /// The parent is not checked against local leaves: the revision was
    /// validated by its origin. Unknown ancestors from `history` are stored
    /// as body-less stubs.
    pub fn apply_foreign_revision(&self, payload: RevisionPayload) -> Result<ForeignApply> {
        let RevisionPayload { doc, history } = payload;
        if doc.id.is_empty() {
            return Err(Error::InvalidPayload("foreign revision without id".into()));
        }
        doc.validate()?;
        let rev = doc
            .rev
            .clone()
            .ok_or_else(|| Error::InvalidRevision(format!("'{}' has no revision", doc.id)))?;
        if history.first() != Some(&rev) {
            return Err(Error::InvalidRevision(format!(
                "history of '{}' must start with {}",
                doc.id, rev
            )));
        }
        if let Some(pair) = history.windows(2).find(|w| !w[1].is_parent_depth_of(&w[0])) {
            return Err(Error::InvalidRevision(format!(
                "{} cannot be the parent of {}",
                pair[1], pair[0]
            )));
        }

        let _gate = self.gate.read();
        let slot = self.slot(&doc.id);
        let mut entry = slot.lock();
        if entry.tree.has_body(&rev) {
            return Ok(ForeignApply::AlreadyPresent);
        }

        let leaf = RevNode::from_document(&doc, rev, history.get(1).cloned());
        let nodes = entry.tree.graft_nodes(&history, leaf);
        let seq = self.commit(&doc.id, &mut entry, nodes)?;
        Ok(ForeignApply::Applied(seq))
    }

    /// The offered revisions this store does not hold.
    pub fn revs_diff(&self, offered: &RevsDiffRequest) -> RevsDiffResponse {
        offered
            .iter()
            .filter_map(|(id, revs)| {
                let missing = self
                    .existing(id)
                    .map_or_else(|| revs.clone(), |slot| slot.lock().tree.missing(revs));
                (!missing.is_empty()).then(|| (id.clone(), missing))
            })
            .collect()
    }

    /// A revision (the winner when `rev` is `None`) with its ancestry.
    pub fn revision_payload(&self, id: &str, rev: Option<&RevId>) -> Result<RevisionPayload> {
        let not_found = || Error::NotFound(id.to_string());
        let slot = self.existing(id).ok_or_else(not_found)?;
        let entry = slot.lock();
        let node = match rev {
            Some(rev) => entry.tree.get(rev),
            None => entry.tree.winner(),
        }
        .ok_or_else(not_found)?;
        let doc = node.to_document(id).ok_or_else(not_found)?;
        let history = entry.tree.history(&node.rev);
        Ok(RevisionPayload { doc, history })
    }

    /// Answer a query from an index.
    pub fn find(&self, query: &Query) -> Result<Page> {
        let indexes = self.indexes.read();
        query::execute(&indexes, query)
    }

    /// Create an index named after its fields. Idempotent on the field tuple.
    pub fn create_index(&self, fields: Vec<IndexField>) -> Result<String> {
        let name = IndexDef::default_name(&fields);
        self.create_named_index(name, fields)
    }

    /// Create an index with an explicit name.
    ///
    /// Returns the name of the index serving these fields, which is an
    /// existing index's name if one already covers the same tuple.
    ///
    /// The index is filled before queries can see it. Commits wait while it
    /// is built.
    pub fn create_named_index(&self, name: impl Into<String>, fields: Vec<IndexField>) -> Result<String> {
        let def = IndexDef::new(name, fields)?;
        let _gate = self.gate.write();
        if let Some(existing) = self.indexes.read().serving(&def)? {
            return Ok(existing);
        }

        let winners: Vec<Arc<Document>> = self
            .slots()
            .iter()
            .filter_map(|slot| slot.lock().winner.clone())
            .collect();
        let index = Index::build(def, &winners);
        let name = index.name().to_string();
        self.indexes.write().insert(index);
        self.persist_indexes()?;

        tracing::info!(index = %name, "index created");
        Ok(name)
    }

    /// All index definitions.
    pub fn list_indexes(&self) -> Vec<IndexDef> {
        self.indexes.read().definitions()
    }

    /// Drop an index by name. Returns whether it existed.
    pub fn drop_index(&self, name: &str) -> Result<bool> {
        let dropped = self.indexes.write().drop_index(name);
        if dropped {
            self.persist_indexes()?;
            tracing::info!(index = %name, "index dropped");
        }
        Ok(dropped)
    }

    fn persist_indexes(&self) -> Result<()> {
        if let Some(files) = &self.files {
            let _meta = files.meta.lock();
            files.write_json(INDEXES_FILE, &self.list_indexes())?;
        }
        Ok(())
    }

    /// Change entries after `since`, ascending, at most `limit`.
    pub fn changes_since(&self, since: Sequence, limit: usize) -> Vec<ChangeEntry> {
        self.feed.read_since(since, limit)
    }

    /// Subscribe to changes after `since`, or to future changes only.
    pub fn subscribe(&self, since: Option<Sequence>) -> Subscription {
        let since = since.unwrap_or_else(|| self.feed.last_seq());
        self.feed.subscribe(since)
    }

    /// Wait until a change after `since` is committed.
    pub async fn wait_for_change(&self, since: Sequence) -> bool {
        self.feed.wait_for(since).await
    }

    /// Highest committed sequence.
    pub fn last_seq(&self) -> Sequence {
        self.feed.last_seq()
    }

    /// Number of documents whose winner is live.
    pub fn doc_count(&self) -> usize {
        self.slots()
            .iter()
            .filter(|slot| slot.lock().live().is_some())
            .count()
    }

    /// Replication checkpoint for a replication id.
    pub fn checkpoint(&self, replication_id: &str) -> Checkpoint {
        self.checkpoints.get(replication_id)
    }

    /// Record that the peer acknowledged local changes up to `seq`.
    pub fn advance_source_checkpoint(&self, replication_id: &str, seq: Sequence) -> Result<Checkpoint> {
        self.save_checkpoint(|| self.checkpoints.advance_source(replication_id, seq))
    }

    /// Record that remote changes up to `seq` are applied locally.
    pub fn advance_target_checkpoint(&self, replication_id: &str, seq: Sequence) -> Result<Checkpoint> {
        self.save_checkpoint(|| self.checkpoints.advance_target(replication_id, seq))
    }

    fn save_checkpoint(&self, advance: impl FnOnce() -> Checkpoint) -> Result<Checkpoint> {
        let Some(files) = &self.files else {
            return Ok(advance());
        };
        let _meta = files.meta.lock();
        let checkpoint = advance();
        files.write_json(CHECKPOINTS_FILE, &self.checkpoints.to_map())?;
        Ok(checkpoint)
    }

    /// Export the current store state as a snapshot.
    pub fn export_state(&self) -> StoreSnapshot {
        let _gate = self.gate.write();
        self.snapshot_locked()
    }

    fn snapshot_locked(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new(self.node_id.clone());
        for slot in self.docs.iter() {
            let entry = slot.value().lock();
            if !entry.tree.is_empty() {
                snapshot.documents.insert(slot.key().clone(), entry.tree.clone());
            }
        }
        snapshot.changes = self.feed.entries();
        snapshot.last_seq = snapshot.changes.len() as Sequence;
        snapshot.indexes = self.list_indexes();
        snapshot.checkpoints = self.checkpoints.to_map();
        snapshot
    }

    /// Import state from a snapshot into an empty store.
    pub fn import_state(&self, snapshot: StoreSnapshot) -> Result<()> {
        snapshot.validate()?;
        if snapshot.node_id != self.node_id {
            return Err(Error::InvalidSnapshot(format!(
                "node ID mismatch: expected '{}', got '{}'",
                self.node_id, snapshot.node_id
            )));
        }

        let _gate = self.gate.write();
        if self.feed.last_seq() > 0 || self.docs.iter().any(|s| !s.value().lock().tree.is_empty()) {
            return Err(Error::InvalidSnapshot("store is not empty".into()));
        }

        let mut defs = self.list_indexes();
        defs.extend(snapshot.indexes.iter().cloned());
        for (id, checkpoint) in &snapshot.checkpoints {
            self.checkpoints.advance_source(id, checkpoint.source_seq);
            self.checkpoints.advance_target(id, checkpoint.target_seq);
        }
        self.load_trees(snapshot.documents, snapshot.changes);
        self.rebuild_indexes(dedup_defs(defs))?;

        if self.files.is_some() {
            self.write_snapshot_locked()?;
            self.persist_indexes()?;
        }
        tracing::info!(last_seq = self.last_seq(), "state imported");
        Ok(())
    }

    /// Write a full snapshot to disk and truncate the journal.
    ///
    /// In-memory stores have nothing to compact and return the metadata of
    /// the current state.
    pub fn compact(&self) -> Result<SnapshotMetadata> {
        let _gate = self.gate.write();
        let metadata = match &self.files {
            Some(_) => self.write_snapshot_locked()?,
            None => SnapshotMetadata::from(&self.snapshot_locked()),
        };
        tracing::info!(
            last_seq = metadata.last_seq,
            docs = metadata.document_count,
            "store compacted"
        );
        Ok(metadata)
    }

    /// Caller holds the gate exclusively.
    fn write_snapshot_locked(&self) -> Result<SnapshotMetadata> {
        let snapshot = self.snapshot_locked();
        if let Some(files) = &self.files {
            let json = snapshot.to_json()?;
            write_atomic(&files.path(SNAPSHOT_FILE), &json, files.sync)?;
            files.journal.truncate()?;
        }
        Ok(SnapshotMetadata::from(&snapshot))
    }

    /// Get snapshot metadata without full export.
    pub fn snapshot_metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            format_version: SNAPSHOT_FORMAT_VERSION,
            node_id: self.node_id.clone(),
            last_seq: self.last_seq(),
            document_count: self.slots().iter().filter(|s| !s.lock().tree.is_empty()).count(),
            index_count: self.indexes.read().definitions().len(),
        }
    }
}

fn tombstone_create(id: &str) -> Error {
    Error::InvalidPayload(format!("cannot create '{}' as a tombstone", id))
}

/// Keep the first definition of each name.
fn dedup_defs(defs: Vec<IndexDef>) -> Vec<IndexDef> {
    let mut seen = std::collections::HashSet::new();
    defs.into_iter()
        .filter(|def| seen.insert(def.name.clone()))
        .collect()
}
