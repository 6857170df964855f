//! Revision identifiers.
//!
//! A revision id is `"{depth}-{hash}"`: the depth of the revision in its
//! document's tree and a content hash over the parent revision, the deleted
//! flag, the canonical body and the attachment digests. Two replicas that make
//! the same edit on the same parent produce the same id.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Number of hex characters kept from the content hash.
const HASH_LEN: usize = 32;

/// Identifier of one immutable revision of a document.
///
/// Ordering rules:
/// 1. Deeper revision wins
/// 2. If depths are equal, lexicographically higher hash wins
///
/// Winner selection relies on this being a total order that every replica
/// computes identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevId {
    /// Distance from the root revision (the root has depth 1)
    pub depth: u64,
    /// Content hash (lowercase hex)
    pub hash: String,
}

impl RevId {
    /// Create a revision id from its parts.
    pub fn new(depth: u64, hash: impl Into<String>) -> Self {
        Self {
            depth,
            hash: hash.into(),
        }
    }

    /// Derive the id of a new revision from its parent and content.
    ///
    /// Fails with `InvalidRevision` when the parent is already at the
    /// maximum depth.
    pub fn compute<'a>(
        parent: Option<&RevId>,
        deleted: bool,
        body: &serde_json::Value,
        attachment_digests: impl Iterator<Item = &'a str>,
    ) -> Result<Self> {
        let depth = match parent {
            Some(parent) => parent.child_depth()?,
            None => 1,
        };
        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.to_string().as_bytes());
        }
        hasher.update([0u8, deleted as u8]);
        // serde_json keeps object keys sorted, so this encoding is canonical.
        hasher.update(body.to_string().as_bytes());
        for digest in attachment_digests {
            hasher.update([0u8]);
            hasher.update(digest.as_bytes());
        }
        let hex: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        Ok(Self {
            depth,
            hash: hex[..HASH_LEN].to_string(),
        })
    }

    /// Depth of a child of this revision.
    pub fn child_depth(&self) -> Result<u64> {
        self.depth
            .checked_add(1)
            .ok_or_else(|| Error::InvalidRevision(format!("{} cannot have children", self)))
    }

    /// Whether `other` could be a direct child of this revision.
    pub fn is_parent_depth_of(&self, other: &RevId) -> bool {
        self.depth.checked_add(1) == Some(other.depth)
    }
}

impl fmt::Display for RevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.depth, self.hash)
    }
}

impl FromStr for RevId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (depth, hash) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidRevision(s.to_string()))?;
        let depth: u64 = depth
            .parse()
            .map_err(|_| Error::InvalidRevision(s.to_string()))?;
        if depth == 0 || hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidRevision(s.to_string()));
        }
        Ok(Self::new(depth, hash))
    }
}

impl TryFrom<String> for RevId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RevId> for String {
    fn from(rev: RevId) -> Self {
        rev.to_string()
    }
}

impl Ord for RevId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.depth.cmp(&other.depth) {
            Ordering::Equal => self.hash.cmp(&other.hash),
            other => other,
        }
    }
}

impl PartialOrd for RevId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
