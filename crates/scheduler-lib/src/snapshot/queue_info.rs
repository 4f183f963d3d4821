use crate::models::{QueueId, ResourceKind};
use serde::{Deserialize, Serialize};

fn default_over_quota_weight() -> f64 {
    1.0
}

/// Quota of one queue for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueQuota {
    /// Amount guaranteed to the queue
    #[serde(default)]
    pub deserved: f64,
    /// Hard cap on the fair share, unlimited when absent
    #[serde(default)]
    pub limit: Option<f64>,
    /// Relative weight when dividing capacity left over after deserved quotas
    #[serde(default = "default_over_quota_weight")]
    pub over_quota_weight: f64,
}

impl Default for QueueQuota {
    fn default() -> Self {
        Self {
            deserved: 0.0,
            limit: None,
            over_quota_weight: default_over_quota_weight(),
        }
    }
}

impl QueueQuota {
    pub fn deserved(deserved: f64) -> Self {
        Self {
            deserved,
            ..Self::default()
        }
    }
}

/// A node of the queue hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub uid: QueueId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<QueueId>,
    /// Filled when the snapshot is built, sorted by id
    #[serde(default)]
    pub children: Vec<QueueId>,
    #[serde(default)]
    pub gpu: QueueQuota,
    #[serde(default)]
    pub cpu: QueueQuota,
    #[serde(default)]
    pub memory: QueueQuota,
}

impl QueueInfo {
    pub fn new(uid: impl Into<QueueId>) -> Self {
        let uid = uid.into();
        Self {
            name: uid.to_string(),
            uid,
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<QueueId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_quota(mut self, kind: ResourceKind, quota: QueueQuota) -> Self {
        match kind {
            ResourceKind::Gpu => self.gpu = quota,
            ResourceKind::Cpu => self.cpu = quota,
            ResourceKind::Memory => self.memory = quota,
        }
        self
    }

    pub fn quota(&self, kind: ResourceKind) -> &QueueQuota {
        match kind {
            ResourceKind::Gpu => &self.gpu,
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Memory => &self.memory,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
