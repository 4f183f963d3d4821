//! Job-group resolution
//!
//! Translates a workload's top-level owner and one of its pods into the pod
//! group the pod belongs to. The default grouper handles any owner as a
//! single group; workload kinds with their own gang semantics get a
//! dedicated grouper.

mod pod;
mod ray;

pub use pod::{parse_cpu_millis, parse_quantity, pod_info_from_k8s, GPU_RESOURCE};
pub use ray::{RayGrouper, RAY_CLUSTER_KIND};

use crate::error::GroupingError;
use crate::models::{PodGroupId, QueueId};
use crate::snapshot::PodGroupInfo;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};

/// Label selecting the queue a workload is submitted to
pub const QUEUE_LABEL: &str = "kai.scheduler/queue";

/// Identity of the object a pod group was derived from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

/// Pod group a pod resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub namespace: String,
    pub queue: QueueId,
    pub min_available: u32,
    /// Resolved priority value of the pod's priority class
    pub priority: i32,
    pub priority_class_name: Option<String>,
    pub owner: OwnerRef,
}

impl From<&Metadata> for PodGroupInfo {
    fn from(metadata: &Metadata) -> Self {
        let mut group = PodGroupInfo::new(PodGroupId::new(&metadata.name), metadata.queue.clone());
        group.name = metadata.name.clone();
        group.namespace = metadata.namespace.clone();
        group.min_member = metadata.min_available;
        group.priority = metadata.priority;
        group.priority_class_name = metadata.priority_class_name.clone();
        group
    }
}

/// Resolves a pod to its pod group given the pod's top-level owner
pub trait PodGrouper: Send + Sync {
    fn get_pod_group_metadata(
        &self,
        top_owner: &DynamicObject,
        pod: &Pod,
        other_owners: &[ObjectMeta],
    ) -> Result<Metadata, GroupingError>;
}

pub(crate) fn owner_kind(owner: &DynamicObject) -> String {
    owner
        .types
        .as_ref()
        .map(|t| t.kind.clone())
        .unwrap_or_default()
}

fn label<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// One pod group per top owner with a single required member
#[derive(Debug, Clone, Default)]
pub struct DefaultGrouper {
    default_queue: Option<QueueId>,
}

impl DefaultGrouper {
    pub fn new(default_queue: Option<QueueId>) -> Self {
        Self { default_queue }
    }

    fn queue(&self, top_owner: &DynamicObject, pod: &Pod) -> Result<QueueId, GroupingError> {
        label(&top_owner.metadata, QUEUE_LABEL)
            .or_else(|| label(&pod.metadata, QUEUE_LABEL))
            .map(QueueId::new)
            .or_else(|| self.default_queue.clone())
            .ok_or_else(|| GroupingError::NoQueue {
                pod: pod.metadata.name.clone().unwrap_or_default(),
            })
    }
}

impl PodGrouper for DefaultGrouper {
    fn get_pod_group_metadata(
        &self,
        top_owner: &DynamicObject,
        pod: &Pod,
        _other_owners: &[ObjectMeta],
    ) -> Result<Metadata, GroupingError> {
        let kind = owner_kind(top_owner);
        let name = top_owner.metadata.name.clone().unwrap_or_default();
        let uid = top_owner
            .metadata
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| GroupingError::MissingUid {
                kind: kind.clone(),
                name: name.clone(),
            })?;

        let namespace = top_owner
            .metadata
            .namespace
            .clone()
            .or_else(|| pod.metadata.namespace.clone())
            .unwrap_or_default();
        let spec = pod.spec.as_ref();
        let priority = spec.and_then(|spec| spec.priority).unwrap_or_default();
        let priority_class_name = spec.and_then(|spec| spec.priority_class_name.clone());

        Ok(Metadata {
            name: format!("pg-{}-{}", name, uid),
            namespace,
            queue: self.queue(top_owner, pod)?,
            min_available: 1,
            priority,
            priority_class_name,
            owner: OwnerRef {
                api_version: top_owner
                    .types
                    .as_ref()
                    .map(|t| t.api_version.clone())
                    .unwrap_or_default(),
                kind,
                name,
                uid,
            },
        })
    }
}

/// Picks the grouper matching the top owner's kind
#[derive(Debug, Clone, Default)]
pub struct GrouperHub {
    default: DefaultGrouper,
    ray: RayGrouper,
}

impl GrouperHub {
    pub fn new(default_queue: Option<QueueId>) -> Self {
        let default = DefaultGrouper::new(default_queue);
        Self {
            ray: RayGrouper::new(default.clone()),
            default,
        }
    }

    pub fn grouper_for(&self, top_owner: &DynamicObject) -> &dyn PodGrouper {
        match owner_kind(top_owner).as_str() {
            RAY_CLUSTER_KIND => &self.ray,
            _ => &self.default,
        }
    }
}

impl PodGrouper for GrouperHub {
    fn get_pod_group_metadata(
        &self,
        top_owner: &DynamicObject,
        pod: &Pod,
        other_owners: &[ObjectMeta],
    ) -> Result<Metadata, GroupingError> {
        self.grouper_for(top_owner)
            .get_pod_group_metadata(top_owner, pod, other_owners)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn owner(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    pub(crate) fn pod(mut value: serde_json::Value) -> Pod {
        value["apiVersion"] = json!("v1");
        value["kind"] = json!("Pod");
        serde_json::from_value(value).unwrap()
    }

    fn deployment(labels: serde_json::Value) -> DynamicObject {
        owner(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "team-a", "uid": "d-1", "labels": labels},
            "spec": {}
        }))
    }

    #[test]
    fn test_default_grouper_uses_owner_queue_label() {
        let grouper = DefaultGrouper::new(Some(QueueId::new("fallback")));
        let pod = pod(json!({
            "metadata": {"name": "web-0", "labels": {"kai.scheduler/queue": "pod-queue"}},
            "spec": {"containers": [], "priorityClassName": "train", "priority": 100}
        }));

        let metadata = grouper
            .get_pod_group_metadata(&deployment(json!({"kai.scheduler/queue": "team-a"})), &pod, &[])
            .unwrap();

        assert_eq!(metadata.name, "pg-web-d-1");
        assert_eq!(metadata.namespace, "team-a");
        assert_eq!(metadata.queue, QueueId::new("team-a"));
        assert_eq!(metadata.min_available, 1);
        assert_eq!(metadata.priority_class_name.as_deref(), Some("train"));
        assert_eq!(metadata.priority, 100);
        assert_eq!(metadata.owner.kind, "Deployment");
        assert_eq!(metadata.owner.api_version, "apps/v1");
    }

    #[test]
    fn test_queue_falls_back_to_pod_then_default() {
        let pod_labelled = pod(json!({"metadata": {"name": "p", "labels": {"kai.scheduler/queue": "pod-queue"}}}));
        let unlabelled = pod(json!({"metadata": {"name": "p"}}));
        let owner = deployment(json!({}));

        let with_default = DefaultGrouper::new(Some(QueueId::new("fallback")));
        assert_eq!(
            with_default.get_pod_group_metadata(&owner, &pod_labelled, &[]).unwrap().queue,
            QueueId::new("pod-queue")
        );
        assert_eq!(
            with_default.get_pod_group_metadata(&owner, &unlabelled, &[]).unwrap().queue,
            QueueId::new("fallback")
        );

        let err = DefaultGrouper::new(None)
            .get_pod_group_metadata(&owner, &unlabelled, &[])
            .unwrap_err();
        assert_eq!(err, GroupingError::NoQueue { pod: "p".to_string() });
    }

    #[test]
    fn test_owner_without_uid_is_rejected() {
        let owner = owner(json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "nightly"}
        }));
        let err = DefaultGrouper::new(Some(QueueId::new("q")))
            .get_pod_group_metadata(&owner, &pod(json!({"metadata": {"name": "p"}})), &[])
            .unwrap_err();
        assert!(matches!(err, GroupingError::MissingUid { kind, .. } if kind == "Job"));
    }

    #[test]
    fn test_metadata_converts_to_pod_group() {
        let metadata = Metadata {
            name: "pg-train-1".to_string(),
            namespace: "ml".to_string(),
            queue: QueueId::new("research"),
            min_available: 3,
            priority: 50,
            priority_class_name: Some("inference".to_string()),
            owner: OwnerRef::default(),
        };
        let group = PodGroupInfo::from(&metadata);
        assert_eq!(group.uid, PodGroupId::new("pg-train-1"));
        assert_eq!(group.queue, QueueId::new("research"));
        assert_eq!(group.min_member, 3);
        assert_eq!(group.priority, 50);
        assert_eq!(group.priority_class_name.as_deref(), Some("inference"));
        assert!(group.pod_infos.is_empty());
    }

    #[test]
    fn test_hub_routes_by_kind() {
        let hub = GrouperHub::new(Some(QueueId::new("q")));
        let cluster = owner(json!({
            "apiVersion": "ray.io/v1",
            "kind": "RayCluster",
            "metadata": {"name": "rc", "uid": "r-1"},
            "spec": {"workerGroupSpecs": [{"replicas": 2}]}
        }));
        let pod = pod(json!({"metadata": {"name": "rc-head"}}));

        assert_eq!(hub.get_pod_group_metadata(&cluster, &pod, &[]).unwrap().min_available, 3);
        assert_eq!(
            hub.get_pod_group_metadata(&deployment(json!({})), &pod, &[]).unwrap().min_available,
            1
        );
    }
}
