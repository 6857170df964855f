//! Document and query routes.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use burrow_engine::{Document, IndexDef, Page, PutResult};

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::handlers::{
    handle_conflicts, handle_create_index, handle_delete_document, handle_drop_index, handle_find,
    handle_get_document, handle_list_indexes, handle_put_document, ConflictsResponse,
    CreateIndexRequest, CreateIndexResponse, FindRequest, PutDocumentRequest, RevParam,
};
use crate::AppState;

/// Create document routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/db", post(create_handler))
        .route(
            "/db/{id}",
            get(get_handler).put(put_handler).delete(delete_handler),
        )
        .route("/db/{id}/conflicts", get(conflicts_handler))
        .route("/find", post(find_handler))
        .route("/index", get(list_indexes_handler).post(create_index_handler))
        .route("/index/{name}", delete(drop_index_handler))
}

/// POST /db - Create a document with a generated id.
async fn create_handler(
    State(state): State<AppState>,
    Json(request): Json<PutDocumentRequest>,
) -> Result<(StatusCode, Json<PutResult>)> {
    let result = handle_put_document(&state.store, String::new(), request)?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// PUT /db/{id} - Create or update a document.
async fn put_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PutDocumentRequest>,
) -> Result<(StatusCode, Json<PutResult>)> {
    let result = handle_put_document(&state.store, id, request)?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /db/{id} - Winning revision of a live document.
async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>> {
    Ok(Json(handle_get_document(&state.store, &id)?))
}

/// DELETE /db/{id}?rev= - Tombstone a document.
async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(param): Query<RevParam>,
) -> Result<Json<PutResult>> {
    Ok(Json(handle_delete_document(&state.store, &id, param)?))
}

/// GET /db/{id}/conflicts
async fn conflicts_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConflictsResponse>> {
    Ok(Json(handle_conflicts(&state.store, &id)?))
}

/// POST /find - Run an indexed query.
async fn find_handler(
    State(state): State<AppState>,
    Json(request): Json<FindRequest>,
) -> Result<Json<Page>> {
    Ok(Json(handle_find(&state.store, request)?))
}

async fn list_indexes_handler(State(state): State<AppState>) -> Json<Vec<IndexDef>> {
    Json(handle_list_indexes(&state.store))
}

/// POST /index - Create an index.
async fn create_index_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateIndexRequest>,
) -> Result<Json<CreateIndexResponse>> {
    Ok(Json(handle_create_index(&state.store, request)?))
}

/// DELETE /index/{name}
async fn drop_index_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    handle_drop_index(&state.store, &name)?;
    Ok(StatusCode::NO_CONTENT)
}
