//! Resource Exporter - pod resource usage signals for Prometheus
//!
//! Polls a Prometheus backend for pod memory and CPU usage and requests,
//! forecasts usage from the recent trend and exports comparative gauges.

use anyhow::{Context, Result};
use exporter_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    CycleRunnerBuilder, GaugePublisher, PrometheusClient,
};
use resource_exporter::{api, config::ExporterConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting resource-exporter");

    let config = ExporterConfig::load()?;
    info!(api_url = %config.api_url, "Exporter configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::QUERY_CLIENT).await;
    health_registry.register(components::CYCLE).await;

    let logger = StructuredLogger::new(&config.api_url);
    logger.log_startup(EXPORTER_VERSION, config.port, config.poll_interval_secs);

    let client = PrometheusClient::new(&config.api_url, config.query_timeout())
        .context("Failed to create Prometheus client")?;

    let runner = CycleRunnerBuilder::new()
        .source(Arc::new(client))
        .pipeline(config.pipeline())
        .query_timeout(config.query_timeout())
        .unhealthy_after(config.unhealthy_after_failures)
        .publisher(GaugePublisher::new())
        .health(health_registry.clone())
        .logger(logger.clone())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let cycle_handle = tokio::spawn(runner.run(config.poll_interval(), shutdown_rx));

    let app_state = Arc::new(api::AppState::new(health_registry));
    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            logger.log_shutdown("API server stopped");
            served??;
        }
    }

    let _ = shutdown_tx.send(());
    let summary = cycle_handle.await?;
    info!(
        cycles = summary.cycles,
        skipped_triggers = summary.skipped,
        "Shutdown complete"
    );

    Ok(())
}
