//! Health check and peer identity endpoints.

use axum::{extract::State, routing::get, Json, Router};
use burrow_engine::PeerInfo;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents: usize,
    pub last_seq: u64,
    pub time: chrono::DateTime<chrono::Utc>,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.store.doc_count(),
        last_seq: state.store.last_seq(),
        time: chrono::Utc::now(),
    })
}

/// GET / - Identify this peer to replicators.
async fn root(State(state): State<AppState>) -> Json<PeerInfo> {
    Json(PeerInfo {
        node_id: state.store.node_id().clone(),
        last_seq: state.store.last_seq(),
    })
}
