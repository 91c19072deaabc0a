//! Sensor Hub - ingests sensor readings and pushes live updates
//!
//! Readings arrive over HTTP, are classified against static thresholds,
//! persisted, and broadcast to every connected live subscriber.

use anyhow::{Context, Result};
use hub_lib::{
    health::{components, HealthRegistry},
    live::LiveChannel,
    observability::StructuredLogger,
    store::open_store,
    SensorHub,
};
use sensor_hub::{api, config};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HUB_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting sensor-hub");

    let config = config::HubConfig::load()?;
    info!(
        instance = %config.instance_name,
        port = config.port,
        utc_offset_hours = config.utc_offset_hours,
        "Hub configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORE).await;

    let store = open_store(&config.database_url, config.pool_size)
        .await
        .context("Failed to open reading store")?;
    let backend = store.backend();

    let logger = StructuredLogger::new(&config.instance_name);
    let hub = SensorHub::new(store)
        .with_thresholds(config.thresholds.to_thresholds()?)
        .with_zone(config.zone()?)
        .with_live_channel(LiveChannel::new(config.live_capacity))
        .with_health(health_registry.clone())
        .with_logger(logger.clone());

    logger.log_startup(HUB_VERSION, backend);

    let app_state = Arc::new(api::AppState::new(hub));

    // Store is open and its schema exists
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    logger.log_shutdown("API server failed");
                    return Err(e);
                }
                Err(e) => {
                    logger.log_shutdown("API server task panicked");
                    return Err(e).context("API server task panicked");
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
