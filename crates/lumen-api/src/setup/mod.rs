//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use lumen_core::Config;
use lumen_processing::{DerivativeGenerators, UploadOrchestrator};
use lumen_storage::Storage;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(crate::telemetry::json_requested())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.server.environment,
        backend = %config.storage.backend,
        "Configuration loaded"
    );

    let storage = lumen_storage::create_storage(&config)
        .await
        .context("Failed to set up storage backend")?;

    let generators =
        DerivativeGenerators::from_config(&config).context("Failed to set up derivative generators")?;

    let state = build_state(Arc::new(config), storage, generators);
    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}

/// Wire the orchestrator and handler state over an existing store.
pub fn build_state(
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    generators: DerivativeGenerators,
) -> Arc<AppState> {
    let uploads = UploadOrchestrator::new(config.clone(), storage.clone(), generators);
    Arc::new(AppState::new(config, storage, uploads))
}
