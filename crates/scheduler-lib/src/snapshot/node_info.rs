use super::pod_info::PodInfo;
use crate::models::{PodId, Resources};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Node label marking nodes that accept GPU workloads under restricted scheduling
pub const GPU_WORKER_LABEL: &str = "node-role.kubernetes.io/gpu-worker";

/// Node label marking nodes that accept CPU-only workloads under restricted scheduling
pub const CPU_WORKER_LABEL: &str = "node-role.kubernetes.io/cpu-worker";

/// A node and the pods currently placed on it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub allocatable: Resources,
    /// Filled when the snapshot is built; ignored in cluster state input
    #[serde(default)]
    pub pod_infos: BTreeMap<PodId, Arc<PodInfo>>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>, allocatable: Resources) -> Self {
        Self {
            name: name.into(),
            allocatable,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn is_gpu_worker(&self) -> bool {
        self.labels.contains_key(GPU_WORKER_LABEL)
    }

    pub fn is_cpu_worker(&self) -> bool {
        self.labels.contains_key(CPU_WORKER_LABEL)
    }

    /// Sum of the requirements of the pods placed on this node
    pub fn used(&self) -> Resources {
        let mut used = Resources::default();
        for pod in self.pod_infos.values() {
            used.add(&pod.res_req);
        }
        used
    }
}
