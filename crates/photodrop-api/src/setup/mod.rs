//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::constants::{RATE_LIMIT_CLEANUP_INTERVAL_SECS, SERVICE_NAME};
use crate::state::AppState;
use anyhow::{Context, Result};
use photodrop_core::Config;
use photodrop_infra::LogFormat;
use photodrop_storage::StorageProvider;
use std::sync::Arc;
use std::time::Duration;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let format = config.log_format.parse::<LogFormat>().unwrap_or_default();
    photodrop_infra::init_telemetry(SERVICE_NAME, &config.environment, format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    config.validate().context("Configuration validation failed")?;
    tracing::info!(environment = %config.environment, "Configuration loaded and validated successfully");

    let missing = config.missing_storage_settings();
    if !missing.is_empty() {
        // Uploads answer 500 until these are set; the process still starts.
        tracing::warn!(missing = %missing.join(","), "Storage is not configured");
    }

    build_app(config, StorageProvider::new())
}

/// Build state and router around a storage provider, without touching telemetry.
pub fn build_app(
    config: Config,
    storage: StorageProvider,
) -> Result<(Arc<AppState>, axum::Router)> {
    let state = Arc::new(AppState::new(config, storage));

    state
        .rate_limiter
        .spawn_cleanup_task(Duration::from_secs(RATE_LIMIT_CLEANUP_INTERVAL_SECS));

    let router = routes::setup_routes(&state.config, state.clone())?;
    Ok((state, router))
}
