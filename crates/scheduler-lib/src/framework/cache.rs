//! Cluster cache feeding sessions with snapshots

use crate::error::CacheError;
use crate::models::PodId;
use crate::snapshot::{ClusterSnapshot, ClusterState, NodeInfo, PodGroupInfo, PodInfo, QueueInfo};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Source of consistent cluster snapshots
#[async_trait]
pub trait Cache: Send + Sync {
    /// Build an immutable snapshot of the current cluster state
    async fn snapshot(&self) -> Result<ClusterSnapshot, CacheError>;
}

/// In-memory cluster cache.
///
/// Updates take the write lock; snapshots are built under the read lock, so
/// a snapshot never observes a partially applied update.
#[derive(Debug, Clone, Default)]
pub struct SchedulerCache {
    state: Arc<RwLock<ClusterState>>,
}

impl SchedulerCache {
    pub fn new(state: ClusterState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy of the raw state
    pub async fn state(&self) -> ClusterState {
        self.state.read().await.clone()
    }

    /// Replace the whole state at once
    pub async fn replace(&self, state: ClusterState) {
        *self.state.write().await = state;
    }

    pub async fn upsert_queue(&self, queue: QueueInfo) {
        let mut state = self.state.write().await;
        match state.queues.iter_mut().find(|q| q.uid == queue.uid) {
            Some(existing) => *existing = queue,
            None => state.queues.push(queue),
        }
    }

    pub async fn upsert_node(&self, node: NodeInfo) {
        let mut state = self.state.write().await;
        match state.nodes.iter_mut().find(|n| n.name == node.name) {
            Some(existing) => *existing = node,
            None => state.nodes.push(node),
        }
    }

    pub async fn upsert_pod_group(&self, group: PodGroupInfo) {
        let mut state = self.state.write().await;
        match state.pod_groups.iter_mut().find(|g| g.uid == group.uid) {
            Some(existing) => *existing = group,
            None => state.pod_groups.push(group),
        }
    }

    pub async fn upsert_pod(&self, pod: PodInfo) {
        debug!(pod = %pod.uid, job = %pod.job, node = %pod.node_name, "Updating pod in cache");
        let mut state = self.state.write().await;
        match state.pods.iter_mut().find(|p| p.uid == pod.uid) {
            Some(existing) => *existing = pod,
            None => state.pods.push(pod),
        }
    }

    /// Record a binding; returns false when the pod is unknown
    pub async fn bind_pod(&self, pod_id: &PodId, node_name: &str) -> bool {
        let mut state = self.state.write().await;
        match state.pods.iter_mut().find(|p| &p.uid == pod_id) {
            Some(pod) => {
                pod.node_name = node_name.to_string();
                true
            }
            None => false,
        }
    }

    pub async fn remove_pod(&self, pod_id: &PodId) -> Option<PodInfo> {
        let mut state = self.state.write().await;
        let index = state.pods.iter().position(|p| &p.uid == pod_id)?;
        Some(state.pods.remove(index))
    }
}

#[async_trait]
impl Cache for SchedulerCache {
    async fn snapshot(&self) -> Result<ClusterSnapshot, CacheError> {
        let state = self.state.read().await;
        Ok(ClusterSnapshot::build(&state)?)
    }
}
