//! Debug endpoint serving the current cluster snapshot as JSON

use crate::error::PluginError;
use crate::framework::{Cache, HandlerResponse, HttpHandler, Plugin, PluginArguments, Session};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub const PLUGIN_NAME: &str = "snapshot";
pub const SNAPSHOT_PATH: &str = "/get-snapshot";

/// Serves a fresh snapshot per request; the failure text becomes a 500 body
pub struct SnapshotHandler {
    cache: Arc<dyn Cache>,
}

impl SnapshotHandler {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl HttpHandler for SnapshotHandler {
    async fn serve(&self) -> HandlerResponse {
        let snapshot = match self.cache.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to take snapshot for debug request");
                return HandlerResponse::internal_error(e.to_string());
            }
        };
        match serde_json::to_value(&snapshot) {
            Ok(body) => HandlerResponse::Json(body),
            Err(e) => HandlerResponse::internal_error(e.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct SnapshotPlugin;

impl SnapshotPlugin {
    pub fn build(_arguments: &PluginArguments) -> Box<dyn Plugin> {
        Box::new(SnapshotPlugin)
    }
}

impl Plugin for SnapshotPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn on_session_open(&mut self, ssn: &mut Session) -> Result<(), PluginError> {
        let handler = Arc::new(SnapshotHandler::new(ssn.cache()));
        ssn.add_http_handler(SNAPSHOT_PATH, handler)?;
        Ok(())
    }

    fn on_session_close(&mut self, _ssn: &mut Session) {}
}
