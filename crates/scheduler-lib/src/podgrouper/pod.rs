//! Conversion of Kubernetes pods into scheduler pods

use crate::error::GroupingError;
use crate::models::{PodGroupId, PodId, Resources};
use crate::snapshot::PodInfo;
use k8s_openapi::api::core::v1::{Container, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

pub const GPU_RESOURCE: &str = "nvidia.com/gpu";

const SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
];

/// Parse a Kubernetes quantity (`512Mi`, `1.5`, `250m`) into base units
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| raw.strip_suffix(suffix).map(|n| (n, *multiplier)))
        .unwrap_or((raw, 1.0));
    let value: f64 = number.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value * multiplier)
}

/// CPU quantity in millicores
pub fn parse_cpu_millis(raw: &str) -> Option<f64> {
    parse_quantity(raw).map(|cores| (cores * 1000.0).round())
}

fn requests(container: &Container, pod_name: &str) -> Result<Resources, GroupingError> {
    let empty = BTreeMap::new();
    let requests: &BTreeMap<String, Quantity> = container
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref())
        .unwrap_or(&empty);

    let invalid = |key: &str, value: &Quantity| GroupingError::InvalidField {
        kind: "Pod".to_string(),
        name: pod_name.to_string(),
        field: format!("containers[{}].resources.requests.{}", container.name, key),
        reason: format!("invalid quantity {:?}", value.0),
    };

    let mut resources = Resources::default();
    for (key, value) in requests {
        let parsed = match key.as_str() {
            "cpu" => parse_cpu_millis(&value.0),
            "memory" | GPU_RESOURCE => parse_quantity(&value.0),
            _ => continue,
        };
        let parsed = parsed.ok_or_else(|| invalid(key, value))?;
        match key.as_str() {
            "cpu" => resources.milli_cpu = parsed,
            "memory" => resources.memory = parsed,
            _ => resources.gpus = parsed,
        }
    }
    Ok(resources)
}

fn max_of(a: Resources, b: Resources) -> Resources {
    Resources::new(
        a.milli_cpu.max(b.milli_cpu),
        a.memory.max(b.memory),
        a.gpus.max(b.gpus),
    )
}

/// Build the scheduler view of a pod assigned to `job`.
///
/// The request is the sum over regular containers, raised to the largest
/// init container request when that is bigger.
pub fn pod_info_from_k8s(pod: &Pod, job: PodGroupId) -> Result<PodInfo, GroupingError> {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let uid = pod
        .metadata
        .uid
        .clone()
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| GroupingError::MissingUid {
            kind: "Pod".to_string(),
            name: name.clone(),
        })?;

    let mut res_req = Resources::default();
    let mut node_name = String::new();
    if let Some(spec) = &pod.spec {
        for container in &spec.containers {
            res_req.add(&requests(container, &name)?);
        }
        for container in spec.init_containers.iter().flatten() {
            res_req = max_of(res_req, requests(container, &name)?);
        }
        node_name = spec.node_name.clone().unwrap_or_default();
    }

    Ok(PodInfo {
        uid: PodId::new(uid),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        name,
        node_name,
        job,
        res_req,
    })
}
