//! # tryon-server
//!
//! HTTP backend for the virtual try-on app.
//!
//! This binary provides:
//! - **Image storage** under canonical per-user names, with list, upload,
//!   delete, copy and rename endpoints
//! - **Image serving** at `/images/{name}` for the client and the model
//! - **Generation** through the hosted try-on model, at most one in flight
//!   per user

mod api;
mod config;
mod error;
mod inflight;
mod synthesis;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tryon_store::FsBlobStore;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::inflight::InFlightGuard;
use crate::synthesis::ReplicateSynthesizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tryon_server=debug")),
        )
        .init();

    info!("Starting try-on server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.replicate_api_key.is_none() {
        tracing::warn!("REPLICATE_API_KEY not set, generation requests will fail");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store = Arc::new(
        FsBlobStore::new(config.blob_storage_path.clone(), config.max_blob_size).await?,
    );
    let synthesizer = Arc::new(ReplicateSynthesizer::new(&config)?);

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        synthesizer,
        inflight: InFlightGuard::new(),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
