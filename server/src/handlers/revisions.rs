//! Revision handlers - the pull and push halves of the replication protocol.

use crate::error::Result;
use burrow_engine::{
    BulkDocsError, BulkDocsRequest, BulkDocsResponse, Error as EngineError, ForeignApply, RevId,
    RevisionPayload, RevsDiffRequest, RevsDiffResponse, Store,
};
use serde::Deserialize;

/// Query parameters for a revision fetch.
#[derive(Debug, Default, Deserialize)]
pub struct RevisionQuery {
    /// Revision to fetch; the winner when absent
    pub rev: Option<RevId>,
}

/// Fetch a revision with its ancestry.
pub fn handle_fetch_revision(store: &Store, id: &str, query: RevisionQuery) -> Result<RevisionPayload> {
    Ok(store.revision_payload(id, query.rev.as_ref())?)
}

/// Report which offered revisions this store is missing.
pub fn handle_revs_diff(store: &Store, request: &RevsDiffRequest) -> RevsDiffResponse {
    let missing = store.revs_diff(request);
    tracing::debug!(
        offered = request.len(),
        missing = missing.len(),
        "computed revs diff"
    );
    missing
}

/// Store pushed revisions.
///
/// Revisions the store rejects are reported per document. Storage failures
/// abort the batch so the pusher retries it.
pub fn handle_bulk_docs(store: &Store, request: BulkDocsRequest) -> Result<BulkDocsResponse> {
    let mut response = BulkDocsResponse::default();

    for payload in request.docs {
        let id = payload.doc.id.clone();
        let rev = payload.rev().cloned();

        match store.apply_foreign_revision(payload) {
            Ok(ForeignApply::Applied(_)) => response.ok += 1,
            Ok(ForeignApply::AlreadyPresent) => {}
            Err(e @ (EngineError::Storage(_) | EngineError::InvalidSnapshot(_))) => {
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(doc_id = %id, "rejected pushed revision: {}", e);
                response.errors.push(BulkDocsError {
                    id,
                    rev,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        stored = response.ok,
        rejected = response.errors.len(),
        "processed bulk docs"
    );
    Ok(response)
}
