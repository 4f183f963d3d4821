//! Read-only view of the cluster for one scheduling cycle
//!
//! A [`ClusterState`] is the flat, mutable description kept by the cache.
//! [`ClusterSnapshot::build`] validates it and indexes every pod into its
//! pod group and, when bound, into its node. The resulting snapshot is
//! never mutated, so every comparator evaluated against it sees the same
//! data for the whole cycle.

mod node_info;
mod pod_info;
mod podgroup_info;
mod queue_info;

pub use node_info::{NodeInfo, CPU_WORKER_LABEL, GPU_WORKER_LABEL};
pub use pod_info::PodInfo;
pub use podgroup_info::PodGroupInfo;
pub use queue_info::{QueueInfo, QueueQuota};

use crate::error::SnapshotError;
use crate::models::{PodGroupId, PodId, QueueId, ResourceKind, Resources};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Flat cluster description, as loaded from JSON or maintained by the cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(default)]
    pub queues: Vec<QueueInfo>,
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
    #[serde(default)]
    pub pod_groups: Vec<PodGroupInfo>,
    #[serde(default)]
    pub pods: Vec<PodInfo>,
}

impl ClusterState {
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

/// Immutable, validated cluster view for one scheduling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub queues: BTreeMap<QueueId, QueueInfo>,
    pub nodes: BTreeMap<String, NodeInfo>,
    pub pod_groups: BTreeMap<PodGroupId, PodGroupInfo>,
    /// Every pod, including pending pods outside any pod group
    #[serde(default)]
    pub pods: BTreeMap<PodId, Arc<PodInfo>>,
}

fn check_quantities(owner: String, resources: &Resources) -> Result<(), SnapshotError> {
    match resources.negative_kind() {
        Some(resource) => Err(SnapshotError::NegativeQuantity { owner, resource }),
        None => Ok(()),
    }
}

fn check_quota(queue: &QueueInfo) -> Result<(), SnapshotError> {
    for kind in ResourceKind::ALL {
        let quota = queue.quota(kind);
        let negative = quota.deserved < 0.0
            || quota.over_quota_weight < 0.0
            || quota.limit.map(|l| l < 0.0).unwrap_or(false);
        if negative {
            return Err(SnapshotError::NegativeQuantity {
                owner: format!("queue/{}", queue.uid),
                resource: kind,
            });
        }
    }
    Ok(())
}

fn duplicate(kind: &'static str, id: impl ToString) -> SnapshotError {
    SnapshotError::DuplicateId {
        kind,
        id: id.to_string(),
    }
}

impl ClusterSnapshot {
    /// Validate a cluster state and index it into a snapshot
    pub fn build(state: &ClusterState) -> Result<Self, SnapshotError> {
        let mut queues = BTreeMap::new();
        for queue in &state.queues {
            check_quota(queue)?;
            if queues.contains_key(&queue.uid) {
                return Err(duplicate("queue", &queue.uid));
            }
            let mut queue = queue.clone();
            queue.children.clear();
            queues.insert(queue.uid.clone(), queue);
        }
        link_queue_hierarchy(&mut queues)?;

        let mut nodes = BTreeMap::new();
        for node in &state.nodes {
            check_quantities(format!("node/{}", node.name), &node.allocatable)?;
            let mut node = node.clone();
            node.pod_infos.clear();
            let name = node.name.clone();
            if nodes.insert(name.clone(), node).is_some() {
                return Err(duplicate("node", name));
            }
        }

        let mut pod_groups = BTreeMap::new();
        for group in &state.pod_groups {
            if !queues.contains_key(&group.queue) {
                return Err(SnapshotError::UnknownQueue {
                    pod_group_id: group.uid.clone(),
                    queue_id: group.queue.clone(),
                });
            }
            let mut group = group.clone();
            group.pod_infos.clear();
            let uid = group.uid.clone();
            if pod_groups.insert(uid.clone(), group).is_some() {
                return Err(duplicate("pod group", uid));
            }
        }

        let mut pods = BTreeMap::new();
        for pod in &state.pods {
            if pods.contains_key(&pod.uid) {
                return Err(duplicate("pod", &pod.uid));
            }
            check_quantities(format!("pod/{}", pod.uid), &pod.res_req)?;
            let pod = Arc::new(pod.clone());
            pods.insert(pod.uid.clone(), pod.clone());

            if !pod.job.is_empty() {
                let group = pod_groups.get_mut(&pod.job).ok_or_else(|| {
                    SnapshotError::UnknownPodGroup {
                        pod_id: pod.uid.clone(),
                        pod_group_id: pod.job.clone(),
                    }
                })?;
                group.pod_infos.insert(pod.uid.clone(), pod.clone());
            }

            if pod.is_bound() {
                let node = nodes
                    .get_mut(&pod.node_name)
                    .ok_or_else(|| SnapshotError::UnknownNode {
                        pod_id: pod.uid.clone(),
                        node_name: pod.node_name.clone(),
                    })?;
                node.pod_infos.insert(pod.uid.clone(), pod);
            }
        }

        Ok(Self {
            queues,
            nodes,
            pod_groups,
            pods,
        })
    }

    /// Queues without a parent, in id order
    pub fn root_queues(&self) -> impl Iterator<Item = &QueueInfo> {
        self.queues.values().filter(|queue| queue.parent.is_none())
    }

    pub fn leaf_queues(&self) -> impl Iterator<Item = &QueueInfo> {
        self.queues.values().filter(|queue| queue.is_leaf())
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }
}

fn link_queue_hierarchy(queues: &mut BTreeMap<QueueId, QueueInfo>) -> Result<(), SnapshotError> {
    let mut links = Vec::new();
    for queue in queues.values() {
        if let Some(parent) = &queue.parent {
            if !queues.contains_key(parent) {
                return Err(SnapshotError::UnknownParentQueue {
                    queue_id: queue.uid.clone(),
                    parent_id: parent.clone(),
                });
            }
            links.push((parent.clone(), queue.uid.clone()));
        }
    }

    for queue in queues.values() {
        let mut steps = 0;
        let mut current = queue.parent.as_ref();
        while let Some(parent) = current {
            steps += 1;
            if steps > queues.len() {
                return Err(SnapshotError::QueueCycle {
                    queue_id: queue.uid.clone(),
                });
            }
            current = queues.get(parent).and_then(|q| q.parent.as_ref());
        }
    }

    // links were collected in child id order, so children stay sorted
    for (parent, child) in links {
        if let Some(queue) = queues.get_mut(&parent) {
            queue.children.push(child);
        }
    }
    Ok(())
}
