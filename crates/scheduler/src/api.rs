//! HTTP API for health checks, Prometheus metrics and plugin debug handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use anyhow::Context;
use prometheus::{Encoder, TextEncoder};
use scheduler_lib::framework::{debug_router, HttpHandlerRegistry};
use scheduler_lib::health::{ComponentStatus, HealthRegistry};
use scheduler_lib::Scheduler;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, scheduler: Arc<Scheduler>) -> Self {
        Self {
            health_registry,
            scheduler,
        }
    }
}

/// 200 while healthy or degraded, 503 when a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Report of the last successful cycle, 404 before the first one
async fn last_cycle(State(state): State<Arc<AppState>>) -> Response {
    match state.scheduler.last_report().await {
        Some(report) => Json(report).into_response(),
        None => (StatusCode::NOT_FOUND, "no cycle has completed yet").into_response(),
    }
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router; unmatched paths go to the plugin debug handlers
pub fn create_router(state: Arc<AppState>, handlers: HttpHandlerRegistry) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/last-cycle", get(last_cycle))
        .with_state(state)
        .merge(debug_router(handlers))
}

pub async fn serve(port: u16, state: Arc<AppState>, handlers: HttpHandlerRegistry) -> anyhow::Result<()> {
    let app = create_router(state, handlers);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    axum::serve(listener, app).await.context("API server error")?;

    Ok(())
}
