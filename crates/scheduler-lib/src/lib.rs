//! Core of a GPU cluster scheduler with hierarchical fair share
//!
//! This crate provides:
//! - A validated, immutable cluster snapshot (queues, nodes, pod groups, pods)
//! - Fair-share allocation across the queue hierarchy
//! - Reclaim ordering by node starvation
//! - A session/plugin framework with debug HTTP handlers
//! - Resolution of workload owners into pod groups
//! - Health checks and observability

pub mod error;
pub mod framework;
pub mod health;
pub mod models;
pub mod observability;
pub mod plugins;
pub mod podgrouper;
pub mod proportion;
pub mod resource_share;
pub mod scheduler;
pub mod snapshot;

pub use error::{CacheError, GroupingError, PluginError, SessionError, SnapshotError};
pub use framework::{
    Cache, Plugin, PluginOption, PluginRegistry, ReclaimPlan, SchedulerCache, Session,
    SessionOptions,
};
pub use models::*;
pub use observability::{SchedulerMetrics, StructuredLogger};
pub use resource_share::{QueueAttributes, QueueResourceShare, ResourceShare};
pub use scheduler::{CycleReport, Scheduler, SchedulerSettings};
pub use snapshot::{ClusterSnapshot, ClusterState};
