use crate::models::{PodGroupId, PodId, Resources};
use serde::{Deserialize, Serialize};

/// A pod as seen by one scheduling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodInfo {
    pub uid: PodId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Node the pod is bound to, empty while unscheduled
    #[serde(default)]
    pub node_name: String,
    /// Owning pod group, empty when the pod has none
    #[serde(default)]
    pub job: PodGroupId,
    #[serde(default)]
    pub res_req: Resources,
}

impl PodInfo {
    pub fn new(uid: impl Into<PodId>, job: impl Into<PodGroupId>, res_req: Resources) -> Self {
        Self {
            uid: uid.into(),
            job: job.into(),
            res_req,
            ..Self::default()
        }
    }

    pub fn bound_to(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn is_bound(&self) -> bool {
        !self.node_name.is_empty()
    }
}
