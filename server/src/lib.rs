//! Burrow Server - serves a document store over the replication API.
//!
//! The server exposes one [`Store`](burrow_engine::Store) to peers: its change
//! feed, revision fetch, revision diff and bulk push, plus plain document
//! endpoints for clients that do not run an engine of their own.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;

use crate::config::Config;
use axum::Router;
use burrow_engine::Store;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve `state` on an already bound listener until the future is dropped.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, create_app(state)).await
}
