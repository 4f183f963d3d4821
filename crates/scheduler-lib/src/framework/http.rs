//! Debug HTTP handlers registered by plugins
//!
//! Handlers live in a process-wide registry shared between the scheduling
//! loop, which re-registers them every session, and the HTTP server, which
//! dispatches inbound requests by path.

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Response produced by a debug handler
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResponse {
    Json(serde_json::Value),
    Error { status: StatusCode, message: String },
}

impl HandlerResponse {
    /// 500 with the error text as body
    pub fn internal_error(message: impl Into<String>) -> Self {
        HandlerResponse::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerResponse::Json(_) => StatusCode::OK,
            HandlerResponse::Error { status, .. } => *status,
        }
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        match self {
            HandlerResponse::Json(body) => (StatusCode::OK, Json(body)).into_response(),
            HandlerResponse::Error { status, message } => (status, message).into_response(),
        }
    }
}

/// A synchronous-per-request debug endpoint
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn serve(&self) -> HandlerResponse;
}

/// Path-keyed registry of debug handlers
#[derive(Clone, Default)]
pub struct HttpHandlerRegistry {
    handlers: Arc<DashMap<String, Arc<dyn HttpHandler>>>,
}

impl HttpHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing the one from a previous session
    pub fn register(&self, path: impl Into<String>, handler: Arc<dyn HttpHandler>) {
        let path = path.into();
        debug!(path = %path, "Registering debug handler");
        self.handlers.insert(path, handler);
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn HttpHandler>> {
        self.handlers.get(path).map(|entry| entry.value().clone())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler for `path`, if any
    pub async fn dispatch(&self, path: &str) -> Option<HandlerResponse> {
        // clone out of the map so no shard lock is held across the await
        let handler = self.get(path)?;
        Some(handler.serve().await)
    }
}

async fn dispatch(
    State(registry): State<HttpHandlerRegistry>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    match registry.dispatch(uri.path()).await {
        Some(response) => response.into_response(),
        None => (StatusCode::NOT_FOUND, format!("no handler for {}", uri.path())).into_response(),
    }
}

/// Router serving every registered debug handler by path
pub fn debug_router(registry: HttpHandlerRegistry) -> Router {
    Router::new().fallback(dispatch).with_state(registry)
}
