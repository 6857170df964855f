//! Document types.

use crate::{
    error::{Error, Result},
    DocId, RevId,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// An opaque binary blob stored by name on a document revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// MIME type supplied by the writer
    pub content_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
    /// `sha256-<hex>` of `data`
    pub digest: String,
}

impl Attachment {
    /// Create an attachment, computing its digest.
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        let digest = Self::digest_of(&data);
        Self {
            content_type: content_type.into(),
            data,
            digest,
        }
    }

    /// Compute the digest string for a blob.
    pub fn digest_of(data: &[u8]) -> String {
        let hex: String = Sha256::digest(data)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        format!("sha256-{}", hex)
    }

    /// Check that the stored digest matches the data.
    pub fn verify(&self) -> bool {
        self.digest == Self::digest_of(&self.data)
    }
}

/// A document: a JSON object identified by `id`, at revision `rev`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier; empty means "assign one on put"
    pub id: DocId,
    /// Revision this document state belongs to (absent on new documents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<RevId>,
    /// Tombstone flag
    #[serde(default)]
    pub deleted: bool,
    /// The document fields (always a JSON object)
    pub body: serde_json::Value,
    /// Named attachments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, Attachment>,
}

impl Document {
    /// Create a new document with the given id and body.
    pub fn new(id: impl Into<DocId>, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            rev: None,
            deleted: false,
            body,
            attachments: BTreeMap::new(),
        }
    }

    /// Create a document whose id is assigned by the store.
    pub fn with_generated_id(body: serde_json::Value) -> Self {
        Self::new(String::new(), body)
    }

    /// Builder-style method to add an attachment.
    pub fn with_attachment(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.attachments.insert(name.into(), attachment);
        self
    }

    /// Check if the document is live (not a tombstone).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Look up a (possibly dotted) field path in the body.
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        field_at(&self.body, path)
    }

    /// Reject bodies that are not JSON objects and attachments whose digest
    /// does not match their data.
    pub fn validate(&self) -> Result<()> {
        if !self.body.is_object() {
            return Err(Error::InvalidPayload("body must be an object".into()));
        }
        if let Some((name, _)) = self.attachments.iter().find(|(_, a)| !a.verify()) {
            return Err(Error::InvalidPayload(format!(
                "attachment '{}' digest mismatch",
                name
            )));
        }
        Ok(())
    }

    /// Digests of all attachments, in name order.
    pub fn attachment_digests(&self) -> impl Iterator<Item = &str> {
        self.attachments.values().map(|a| a.digest.as_str())
    }
}

/// Resolve a dotted path (`"author.name"`) inside a JSON value.
pub fn field_at<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}
