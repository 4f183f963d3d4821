//! Error types for the scheduler core

use crate::models::{PodGroupId, PodId, QueueId, ResourceKind};

/// Precondition violations found while building a cluster snapshot
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Duplicate {kind} identifier: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Pod {pod_id} references unknown pod group {pod_group_id}")]
    UnknownPodGroup {
        pod_id: PodId,
        pod_group_id: PodGroupId,
    },

    #[error("Pod group {pod_group_id} references unknown queue {queue_id}")]
    UnknownQueue {
        pod_group_id: PodGroupId,
        queue_id: QueueId,
    },

    #[error("Pod {pod_id} is bound to unknown node {node_name}")]
    UnknownNode { pod_id: PodId, node_name: String },

    #[error("Queue {queue_id} references unknown parent queue {parent_id}")]
    UnknownParentQueue { queue_id: QueueId, parent_id: QueueId },

    #[error("Queue hierarchy contains a cycle through {queue_id}")]
    QueueCycle { queue_id: QueueId },

    #[error("Negative {resource} quantity on {owner}")]
    NegativeQuantity {
        owner: String,
        resource: ResourceKind,
    },
}

/// Errors raised by a cluster cache
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Failed to build snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Cache is unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a plugin while handling a session
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Invalid value {value:?} for argument {key} of plugin {plugin}")]
    InvalidArgument {
        plugin: String,
        key: String,
        value: String,
    },

    #[error("Plugin {plugin} failed: {message}")]
    Failed { plugin: String, message: String },

    #[error("Session rejected registration: {0}")]
    Rejected(String),
}

impl From<SessionError> for PluginError {
    fn from(err: SessionError) -> Self {
        PluginError::Rejected(err.to_string())
    }
}

/// Errors raised by the scheduling session framework
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Session {session_id} is {actual}, expected {expected}")]
    InvalidState {
        session_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Plugin {plugin} failed to open session: {source}")]
    PluginOpen {
        plugin: String,
        #[source]
        source: PluginError,
    },

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Pod group {0} has no pods and cannot be ordered")]
    EmptyPodGroup(PodGroupId),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors raised while resolving a pod into its pod group
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GroupingError {
    #[error("Owner {kind}/{name} is missing field {field}")]
    MissingField {
        kind: String,
        name: String,
        field: String,
    },

    #[error("Owner {kind}/{name} has invalid field {field}: {reason}")]
    InvalidField {
        kind: String,
        name: String,
        field: String,
        reason: String,
    },

    #[error("Owner {kind}/{name} has no uid")]
    MissingUid { kind: String, name: String },

    #[error("Cannot determine queue for pod {pod}")]
    NoQueue { pod: String },
}
