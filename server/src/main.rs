//! Burrow Server binary.

use burrow_engine::Store;
use burrow_server::{config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "burrow_server=debug,burrow_engine=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        node_id = %config.node_id,
        "Starting Burrow Server on {}:{}",
        config.host,
        config.port
    );

    // Open the store
    let store = Store::open(config.store_config())?;
    match &config.data_dir {
        Some(dir) => tracing::info!(
            documents = store.doc_count(),
            last_seq = store.last_seq(),
            "Opened store at {}",
            dir.display()
        ),
        None => tracing::warn!("DATA_DIR not set, store is in memory only"),
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(Arc::new(store), config);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    burrow_server::serve(listener, state).await?;

    Ok(())
}
