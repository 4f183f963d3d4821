//! RayCluster pod groups: the head plus the minimum of every worker group

use super::{owner_kind, DefaultGrouper, Metadata, PodGrouper};
use crate::error::GroupingError;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use serde_json::Value;

pub const RAY_CLUSTER_KIND: &str = "RayCluster";

#[derive(Debug, Clone, Default)]
pub struct RayGrouper {
    base: DefaultGrouper,
}

impl RayGrouper {
    pub fn new(base: DefaultGrouper) -> Self {
        Self { base }
    }

    /// `1 + sum(minReplicas * numOfHosts)` over the worker groups, with
    /// `replicas` standing in for a missing `minReplicas`
    fn min_available(&self, cluster: &DynamicObject) -> Result<u32, GroupingError> {
        let kind = owner_kind(cluster);
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let invalid = |field: String, reason: &str| GroupingError::InvalidField {
            kind: kind.clone(),
            name: name.clone(),
            field,
            reason: reason.to_string(),
        };

        let spec = cluster
            .data
            .get("spec")
            .filter(|spec| !spec.is_null())
            .ok_or_else(|| GroupingError::MissingField {
                kind: kind.clone(),
                name: name.clone(),
                field: "spec".to_string(),
            })?;

        let groups = match spec.get("workerGroupSpecs") {
            None | Some(Value::Null) => return Ok(1),
            Some(Value::Array(groups)) => groups,
            Some(_) => {
                return Err(invalid(
                    "spec.workerGroupSpecs".to_string(),
                    "expected a list",
                ))
            }
        };

        let mut total: u64 = 1;
        for (index, group) in groups.iter().enumerate() {
            let count = |key: &str, default: Option<u64>| -> Result<Option<u64>, GroupingError> {
                match group.get(key) {
                    None | Some(Value::Null) => Ok(default),
                    Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                        invalid(
                            format!("spec.workerGroupSpecs[{}].{}", index, key),
                            "expected a non-negative integer",
                        )
                    }),
                }
            };

            let replicas = match count("minReplicas", None)? {
                Some(min) => min,
                None => count("replicas", Some(0))?.unwrap_or(0),
            };
            let hosts = count("numOfHosts", Some(1))?.unwrap_or(1);
            total = total.saturating_add(replicas.saturating_mul(hosts));
        }

        u32::try_from(total)
            .map_err(|_| invalid("spec.workerGroupSpecs".to_string(), "too many workers"))
    }
}

impl PodGrouper for RayGrouper {
    fn get_pod_group_metadata(
        &self,
        top_owner: &DynamicObject,
        pod: &Pod,
        other_owners: &[ObjectMeta],
    ) -> Result<Metadata, GroupingError> {
        let mut metadata = self
            .base
            .get_pod_group_metadata(top_owner, pod, other_owners)?;
        metadata.min_available = self.min_available(top_owner)?;
        Ok(metadata)
    }
}
