use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};

use vitalwatch::api::{ReportCache, RestApi};
use vitalwatch::config::load_config;
use vitalwatch::storage::persistence::load_store;
use vitalwatch::{AnalysisEngine, AppError};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let config = load_config(&config_path)?;
    info!(config = %config_path.display(), "Starting VitalWatch");

    // Loaded once; read-only for the life of the process
    let store = Arc::new(load_store(&config.storage.feed_path, config.storage.format)?);
    let engine = AnalysisEngine::new(&config.analysis);
    let cache = ReportCache::from_config(&config.cache);
    let api = RestApi::new(Arc::clone(&store), engine, cache);

    let addr = config.api.socket_addr()?;
    info!(%addr, "Starting server");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let (_, server) = warp::serve(api.routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            info!("Shutting down server...");
        })
        .map_err(|e| AppError::Server(e.to_string()))?;

    let server_handle = tokio::spawn(server);

    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; shutting down");
    } else {
        info!("Ctrl+C received, starting graceful shutdown");
    }

    shutdown_tx.send(()).ok();

    server_handle
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    info!("Server shutdown complete");
    Ok(())
}
