//! Wire types shared by the replication server and its clients.

use crate::{feed::ChangeEntry, DocId, Document, NodeId, RevId, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and position of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub node_id: NodeId,
    pub last_seq: Sequence,
}

/// One page of a peer's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesResponse {
    pub results: Vec<ChangeEntry>,
    /// Sequence of the last entry in `results`, or the request's `since`
    /// when the page is empty
    pub last_seq: Sequence,
}

/// A revision with enough ancestry to graft it into another tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionPayload {
    /// The revision's content; `doc.rev` must be set
    pub doc: Document,
    /// The revision followed by its ancestors, newest first
    pub history: Vec<RevId>,
}

impl RevisionPayload {
    /// The revision carried by this payload.
    pub fn rev(&self) -> Option<&RevId> {
        self.doc.rev.as_ref()
    }
}

/// Revisions pushed to a peer in one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDocsRequest {
    pub docs: Vec<RevisionPayload>,
}

/// A revision the receiving peer refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDocsError {
    pub id: DocId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<RevId>,
    pub reason: String,
}

/// Outcome of a bulk push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDocsResponse {
    /// Number of revisions newly stored
    pub ok: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BulkDocsError>,
}

/// Revisions a peer offers, by document id.
pub type RevsDiffRequest = BTreeMap<DocId, Vec<RevId>>;

/// The offered revisions the receiving peer does not have, by document id.
pub type RevsDiffResponse = BTreeMap<DocId, Vec<RevId>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn changes_response_wire_format() {
        let rev: RevId = "1-0123456789abcdef0123456789abcdef".parse().unwrap();
        let response = ChangesResponse {
            results: vec![ChangeEntry {
                seq: 4,
                id: "a".into(),
                rev,
                deleted: false,
            }],
            last_seq: 4,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "results": [{
                    "seq": 4,
                    "id": "a",
                    "rev": "1-0123456789abcdef0123456789abcdef",
                    "deleted": false
                }],
                "lastSeq": 4
            })
        );
    }

    #[test]
    fn bulk_docs_response_omits_empty_errors() {
        let value = serde_json::to_value(BulkDocsResponse { ok: 2, errors: vec![] }).unwrap();
        assert_eq!(value, json!({"ok": 2}));
    }

    #[test]
    fn peer_info_uses_camel_case() {
        let info: PeerInfo = serde_json::from_value(json!({"nodeId": "n1", "lastSeq": 9})).unwrap();
        assert_eq!(info.node_id, "n1");
        assert_eq!(info.last_seq, 9);
    }
}
