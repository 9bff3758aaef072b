//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use uplink_core::{Config, IdentityLookup};
use uplink_db::BusinessRepository;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        store_backend = %config.store_backend,
        "Configuration loaded and validated successfully"
    );

    let store = uplink_store::create_store(&config)
        .await
        .context("Failed to connect to key-value store")?;

    let pool = uplink_db::connect(&config.database_url)
        .await
        .context("Failed to open business registry")?;
    let identity: Arc<dyn IdentityLookup> = Arc::new(BusinessRepository::new(pool));

    let state = services::initialize_services(&config, store, identity);
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
