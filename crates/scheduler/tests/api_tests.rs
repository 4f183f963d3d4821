//! Integration tests for the scheduler HTTP surface

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use scheduler_lib::{
    framework::{debug_router, Cache, HttpHandlerRegistry},
    health::{components, ComponentStatus, HealthRegistry},
    plugins::{default_registry, SNAPSHOT_PATH},
    CacheError, ClusterSnapshot, ClusterState, Resources, Scheduler, SchedulerCache,
    SchedulerSettings, StructuredLogger,
};
use scheduler_lib::snapshot::{NodeInfo, PodGroupInfo, PodInfo, QueueInfo};
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Clone)]
struct AppState {
    health_registry: HealthRegistry,
}

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

fn create_test_router(state: Arc<AppState>, handlers: HttpHandlerRegistry) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
        .merge(debug_router(handlers))
}

struct Unavailable;

#[async_trait]
impl Cache for Unavailable {
    async fn snapshot(&self) -> Result<ClusterSnapshot, CacheError> {
        Err(CacheError::Unavailable("informers not synced".to_string()))
    }
}

fn cluster_state() -> ClusterState {
    ClusterState {
        queues: vec![QueueInfo::new("research")],
        nodes: vec![NodeInfo::new("gpu-node-1", Resources::with_gpus(8.0))],
        pod_groups: vec![PodGroupInfo::new("train", "research")],
        pods: vec![PodInfo::new("train-0", "train", Resources::with_gpus(4.0)).bound_to("gpu-node-1")],
    }
}

/// Run one scheduling cycle so the plugins register their handlers
async fn setup_test_app(cache: Arc<dyn Cache>) -> (Router, HealthRegistry) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCHEDULER).await;
    let handlers = HttpHandlerRegistry::new();

    let scheduler = Scheduler::new(
        cache,
        default_registry(),
        SchedulerSettings::default(),
        handlers.clone(),
        health_registry.clone(),
        StructuredLogger::new("api-test"),
    );
    if scheduler.run_once().await.is_ok() {
        health_registry.set_ready(true).await;
    }

    let state = Arc::new(AppState {
        health_registry: health_registry.clone(),
    });
    (create_test_router(state, handlers), health_registry)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_get_snapshot_returns_json() {
    let (app, _) = setup_test_app(Arc::new(SchedulerCache::new(cluster_state()))).await;

    let response = app.oneshot(get_request(SNAPSHOT_PATH)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(snapshot["queues"]["research"]["uid"], "research");
    assert_eq!(
        snapshot["nodes"]["gpu-node-1"]["pod_infos"]["train-0"]["job"],
        "train"
    );
    assert_eq!(snapshot["pod_groups"]["train"]["queue"], "research");
}

#[tokio::test]
async fn test_get_snapshot_reflects_cache_updates() {
    let cache = Arc::new(SchedulerCache::new(cluster_state()));
    let (app, _) = setup_test_app(cache.clone()).await;

    cache
        .upsert_pod(PodInfo::new("train-1", "train", Resources::with_gpus(4.0)))
        .await;

    let response = app.oneshot(get_request(SNAPSHOT_PATH)).await.unwrap();
    let snapshot: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let pods = snapshot["pod_groups"]["train"]["pod_infos"].as_object().unwrap();
    assert_eq!(pods.len(), 2);
}

#[tokio::test]
async fn test_get_snapshot_failure_returns_500_with_error_text() {
    // the handler registered by a healthy cycle now serves from a broken cache
    let handlers = HttpHandlerRegistry::new();
    handlers.register(
        SNAPSHOT_PATH,
        Arc::new(scheduler_lib::plugins::SnapshotHandler::new(Arc::new(Unavailable))),
    );
    let state = Arc::new(AppState {
        health_registry: HealthRegistry::new(),
    });
    let app = create_test_router(state, handlers);

    let response = app.oneshot(get_request(SNAPSHOT_PATH)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body, "Cache is unavailable: informers not synced");
}

#[tokio::test]
async fn test_unknown_debug_path_returns_404() {
    let (app, _) = setup_test_app(Arc::new(SchedulerCache::new(cluster_state()))).await;

    let response = app.oneshot(get_request("/get-nothing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_follows_first_cycle() {
    let (app, _) = setup_test_app(Arc::new(SchedulerCache::new(cluster_state()))).await;
    let response = app.oneshot(get_request("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (app, _) = setup_test_app(Arc::new(Unavailable)).await;
    let response = app.clone().oneshot(get_request("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // no session ever opened, so no debug handler exists
    let response = app.oneshot(get_request(SNAPSHOT_PATH)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_healthz_reports_unhealthy_component() {
    let (app, health) = setup_test_app(Arc::new(SchedulerCache::new(cluster_state()))).await;
    health
        .set_unhealthy(components::CACHE, "snapshot invalid")
        .await;

    let response = app.oneshot(get_request("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["components"]["cache"]["message"], "snapshot invalid");
}
