//! Revision trees and deterministic winner selection.
//!
//! This is the core of convergence. Every document keeps a tree of immutable
//! revisions stored in an arena keyed by [`RevId`], with parents referenced by
//! id. Concurrent edits on the same parent become sibling leaves; one leaf is
//! picked as the winner by a rule that depends only on the set of revisions,
//! never on arrival order.
//!
//! # Winner rule
//!
//! 1. Live leaves beat tombstoned leaves
//! 2. Deeper leaves beat shallower ones
//! 3. Higher revision hash wins the remaining tie

use crate::{Attachment, DocId, Document, RevId, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One immutable revision in a document's tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevNode {
    /// Revision id
    pub rev: RevId,
    /// Parent revision (absent for roots, including truncated remote histories)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RevId>,
    /// Tombstone flag
    #[serde(default)]
    pub deleted: bool,
    /// Body, or `None` for ancestors known only by id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Attachments carried by this revision
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, Attachment>,
    /// Change feed sequence that committed this revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<Sequence>,
}

impl RevNode {
    /// Build a full revision node from document content.
    pub fn from_document(doc: &Document, rev: RevId, parent: Option<RevId>) -> Self {
        Self {
            rev,
            parent,
            deleted: doc.deleted,
            body: Some(doc.body.clone()),
            attachments: doc.attachments.clone(),
            seq: None,
        }
    }

    /// An ancestor known only by id.
    pub fn stub(rev: RevId, parent: Option<RevId>) -> Self {
        Self {
            rev,
            parent,
            deleted: false,
            body: None,
            attachments: BTreeMap::new(),
            seq: None,
        }
    }

    /// Whether the body of this revision is unknown locally.
    pub fn is_stub(&self) -> bool {
        self.body.is_none()
    }

    /// Materialize this revision as a document.
    pub fn to_document(&self, id: &str) -> Option<Document> {
        let body = self.body.clone()?;
        Some(Document {
            id: id.to_string(),
            rev: Some(self.rev.clone()),
            deleted: self.deleted,
            body,
            attachments: self.attachments.clone(),
        })
    }

    fn rank(&self) -> (bool, &RevId) {
        (!self.deleted, &self.rev)
    }
}

/// The revision tree of a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RevNode>", into = "Vec<RevNode>")]
pub struct RevTree {
    nodes: BTreeMap<RevId, RevNode>,
    leaves: BTreeSet<RevId>,
}

impl RevTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the tree has no revisions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of revisions, stubs included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether a revision is known (stubs count).
    pub fn contains(&self, rev: &RevId) -> bool {
        self.nodes.contains_key(rev)
    }

    /// Check whether a revision is known with its body.
    pub fn has_body(&self, rev: &RevId) -> bool {
        self.nodes.get(rev).is_some_and(|n| !n.is_stub())
    }

    /// Get a revision node.
    pub fn get(&self, rev: &RevId) -> Option<&RevNode> {
        self.nodes.get(rev)
    }

    /// Check whether a revision is a current leaf.
    pub fn is_leaf(&self, rev: &RevId) -> bool {
        self.leaves.contains(rev)
    }

    /// All current leaves, in revision order.
    pub fn leaves(&self) -> impl Iterator<Item = &RevNode> {
        self.leaves.iter().filter_map(|rev| self.nodes.get(rev))
    }

    /// The winning leaf.
    pub fn winner(&self) -> Option<&RevNode> {
        self.leaves().max_by(|a, b| a.rank().cmp(&b.rank()))
    }

    /// Whether every leaf is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.winner().map_or(true, |w| w.deleted)
    }

    /// Live leaves that lost winner selection, best first.
    pub fn conflicts(&self) -> Vec<RevId> {
        let winner = self.winner().map(|w| w.rev.clone());
        let mut losers: Vec<&RevNode> = self
            .leaves()
            .filter(|n| !n.deleted && Some(&n.rev) != winner.as_ref())
            .collect();
        losers.sort_by(|a, b| b.rank().cmp(&a.rank()));
        losers.into_iter().map(|n| n.rev.clone()).collect()
    }

    /// A revision followed by its known ancestors, newest first.
    pub fn history(&self, rev: &RevId) -> Vec<RevId> {
        let mut history = Vec::new();
        let mut current = self.nodes.get(rev);
        while let Some(node) = current {
            history.push(node.rev.clone());
            current = node.parent.as_ref().and_then(|p| self.nodes.get(p));
        }
        history
    }

    /// The subset of `revs` this tree does not hold with a body.
    pub fn missing<'a>(&self, revs: impl IntoIterator<Item = &'a RevId>) -> Vec<RevId> {
        revs.into_iter()
            .filter(|rev| !self.has_body(rev))
            .cloned()
            .collect()
    }

    /// Nodes needed to graft a remote revision and its history into this tree.
    ///
    /// `history` lists the revision first, then its ancestors newest first.
    /// Ancestors already present stop the walk; unknown ones become stubs.
    /// The returned nodes are ordered oldest first, ending with the leaf.
    pub fn graft_nodes(&self, history: &[RevId], leaf: RevNode) -> Vec<RevNode> {
        let mut stubs = Vec::new();
        for (i, rev) in history.iter().enumerate().skip(1) {
            if self.contains(rev) {
                break;
            }
            stubs.push(RevNode::stub(rev.clone(), history.get(i + 1).cloned()));
        }
        stubs.reverse();
        stubs.push(leaf);
        stubs
    }

    /// Insert a revision, keeping the leaf set current.
    ///
    /// Inserting a full node over an existing stub fills in its body.
    pub fn insert(&mut self, node: RevNode) {
        if let Some(existing) = self.nodes.get_mut(&node.rev) {
            if existing.is_stub() && !node.is_stub() {
                *existing = node;
            }
            return;
        }

        if let Some(parent) = &node.parent {
            self.leaves.remove(parent);
        }
        let has_child = self
            .nodes
            .values()
            .any(|n| n.parent.as_ref() == Some(&node.rev));
        if !has_child {
            self.leaves.insert(node.rev.clone());
        }
        self.nodes.insert(node.rev.clone(), node);
    }

    /// Materialize the winning revision as a document.
    pub fn winner_document(&self, id: &DocId) -> Option<Document> {
        self.winner().and_then(|w| w.to_document(id))
    }

    /// Iterate over all revision nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &RevNode> {
        self.nodes.values()
    }
}

impl From<Vec<RevNode>> for RevTree {
    fn from(nodes: Vec<RevNode>) -> Self {
        let mut tree = RevTree::new();
        for node in nodes {
            tree.insert(node);
        }
        tree
    }
}

impl From<RevTree> for Vec<RevNode> {
    fn from(tree: RevTree) -> Self {
        tree.nodes.into_values().collect()
    }
}
