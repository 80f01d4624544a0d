//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use pixdrop_core::Config;
use pixdrop_services::create_storage;
use std::sync::Arc;

/// Initialize telemetry, storage, services and routes.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    pixdrop_infra::init_telemetry(&config.base.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        quota_enforced = config.limits.quota_enforced,
        "Configuration loaded and validated successfully"
    );

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize object store")?;

    let state = Arc::new(AppState::new(config.clone(), storage));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
