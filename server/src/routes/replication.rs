//! Replication endpoint routes.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use burrow_engine::{
    BulkDocsRequest, BulkDocsResponse, ChangesResponse, RevisionPayload, RevsDiffRequest,
    RevsDiffResponse,
};

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::handlers::{
    handle_bulk_docs, handle_changes, handle_fetch_revision, handle_revs_diff, ChangesQuery,
    RevisionQuery,
};
use crate::AppState;

/// Create replication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/changes", get(changes_handler))
        .route("/revs_diff", post(revs_diff_handler))
        .route("/doc", post(bulk_docs_handler))
        .route("/doc/{id}", get(revision_handler))
}

/// GET /changes - Read the change feed.
async fn changes_handler(
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
) -> Json<ChangesResponse> {
    Json(handle_changes(&state.store, state.config.changes_max_limit, query).await)
}

/// POST /revs_diff - Which offered revisions are missing here.
async fn revs_diff_handler(
    State(state): State<AppState>,
    Json(request): Json<RevsDiffRequest>,
) -> Json<RevsDiffResponse> {
    Json(handle_revs_diff(&state.store, &request))
}

/// POST /doc - Store pushed revisions.
async fn bulk_docs_handler(
    State(state): State<AppState>,
    Json(request): Json<BulkDocsRequest>,
) -> Result<Json<BulkDocsResponse>> {
    Ok(Json(handle_bulk_docs(&state.store, request)?))
}

/// GET /doc/{id} - Fetch a revision with its ancestry.
async fn revision_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RevisionQuery>,
) -> Result<Json<RevisionPayload>> {
    Ok(Json(handle_fetch_revision(&state.store, &id, query)?))
}
