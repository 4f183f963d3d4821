use super::pod_info::PodInfo;
use crate::models::{PodGroupId, PodId, QueueId, Resources};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_min_member() -> u32 {
    1
}

/// A scheduling unit: pods that must be considered together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodGroupInfo {
    pub uid: PodGroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub queue: QueueId,
    /// Minimum number of pods that must be schedulable together
    #[serde(default = "default_min_member")]
    pub min_member: u32,
    /// Higher is served first and evicted last
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
    /// Filled when the snapshot is built; ignored in cluster state input
    #[serde(default)]
    pub pod_infos: BTreeMap<PodId, Arc<PodInfo>>,
}

impl PodGroupInfo {
    pub fn new(uid: impl Into<PodGroupId>, queue: impl Into<QueueId>) -> Self {
        Self {
            uid: uid.into(),
            queue: queue.into(),
            min_member: default_min_member(),
            ..Self::default()
        }
    }

    pub fn with_pod(mut self, pod: PodInfo) -> Self {
        self.pod_infos.insert(pod.uid.clone(), Arc::new(pod));
        self
    }

    pub fn bound_pods(&self) -> impl Iterator<Item = &Arc<PodInfo>> {
        self.pod_infos.values().filter(|pod| pod.is_bound())
    }

    pub fn has_bound_pods(&self) -> bool {
        self.bound_pods().next().is_some()
    }

    pub fn has_pending_pods(&self) -> bool {
        self.pod_infos.values().any(|pod| !pod.is_bound())
    }

    /// Resources requested by every pod of the group, bound or not
    pub fn requested(&self) -> Resources {
        let mut total = Resources::default();
        for pod in self.pod_infos.values() {
            total.add(&pod.res_req);
        }
        total
    }

    /// Resources held by the bound pods of the group
    pub fn allocated(&self) -> Resources {
        let mut total = Resources::default();
        for pod in self.bound_pods() {
            total.add(&pod.res_req);
        }
        total
    }
}
