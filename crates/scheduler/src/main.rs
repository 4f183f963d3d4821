//! Reclaim scheduler
//!
//! Runs the scheduling loop over an in-memory cluster cache and serves
//! health, metrics and plugin debug endpoints.

use anyhow::{Context, Result};
use scheduler_lib::{
    framework::HttpHandlerRegistry,
    health::HealthRegistry,
    plugins::default_registry,
    ClusterState, SchedulerCache, Scheduler, StructuredLogger,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SCHEDULER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::SchedulerConfig::load()?;
    info!(scheduler = %config.scheduler_name, port = config.api_port, "Scheduler configured");

    let state = match &config.cluster_state_path {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read cluster state {}", path.display()))?;
            ClusterState::from_json(&data)
                .with_context(|| format!("Failed to parse cluster state {}", path.display()))?
        }
        None => ClusterState::default(),
    };
    let cache = Arc::new(SchedulerCache::new(state));

    let logger = StructuredLogger::new(&config.scheduler_name);
    let settings = config.settings();
    let plugin_names: Vec<String> = settings.plugins.iter().map(|p| p.name.clone()).collect();
    logger.log_startup(SCHEDULER_VERSION, &plugin_names);

    let health_registry = HealthRegistry::new();
    let handlers = HttpHandlerRegistry::new();
    let scheduler = Arc::new(Scheduler::new(
        cache,
        default_registry(),
        settings,
        handlers.clone(),
        health_registry.clone(),
        logger.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler_handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(health_registry, scheduler));
    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state, handlers));

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            Ok(())
        }
        served = &mut api_handle => {
            let err = match served {
                Ok(Ok(())) => anyhow::anyhow!("API server stopped unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => e.into(),
            };
            error!(error = %format!("{:#}", err), "API server failed");
            logger.log_shutdown("API server failed");
            Err(err)
        }
    };

    let _ = shutdown_tx.send(());
    scheduler_handle.await?;

    result
}
