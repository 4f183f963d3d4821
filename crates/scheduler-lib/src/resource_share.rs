//! Per-queue share accounting
//!
//! A [`ResourceShare`] tracks, for one queue and one resource kind, what the
//! queue is entitled to (`fair_share`) next to what it currently holds
//! (`allocated`). `allocated` above `fair_share` is a normal state: it is
//! exactly the over-allocation the reclaim ordering looks for.

use crate::models::{QueueId, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share accounting of one resource kind for one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceShare {
    pub deserved: f64,
    pub fair_share: f64,
    pub max_allowed: Option<f64>,
    pub over_quota_weight: f64,
    pub allocated: f64,
    pub request: f64,
}

impl ResourceShare {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(fair_share: f64, allocated: f64) -> Self {
        Self {
            fair_share,
            allocated,
            ..Self::default()
        }
    }

    /// Ratio of allocated to fair share, `None` when the fair share is zero
    pub fn allocation_ratio(&self) -> Option<f64> {
        if self.fair_share > 0.0 {
            Some(self.allocated / self.fair_share)
        } else {
            None
        }
    }

    pub fn is_over_allocated(&self) -> bool {
        self.allocated > self.fair_share
    }
}

/// A queue's share accounting across all resource kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueResourceShare {
    pub gpu: ResourceShare,
    pub cpu: ResourceShare,
    pub memory: ResourceShare,
}

impl QueueResourceShare {
    pub fn get(&self, kind: ResourceKind) -> &ResourceShare {
        match kind {
            ResourceKind::Gpu => &self.gpu,
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Memory => &self.memory,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut ResourceShare {
        match kind {
            ResourceKind::Gpu => &mut self.gpu,
            ResourceKind::Cpu => &mut self.cpu,
            ResourceKind::Memory => &mut self.memory,
        }
    }
}

/// Computed attributes of one queue for a scheduling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueAttributes {
    pub uid: QueueId,
    pub name: String,
    pub parent: Option<QueueId>,
    pub children: Vec<QueueId>,
    #[serde(flatten)]
    pub share: QueueResourceShare,
}

impl QueueAttributes {
    pub fn new(uid: impl Into<QueueId>, share: QueueResourceShare) -> Self {
        let uid = uid.into();
        Self {
            name: uid.to_string(),
            uid,
            share,
            ..Self::default()
        }
    }

    pub fn fair_share(&self) -> BTreeMap<ResourceKind, f64> {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, self.share.get(kind).fair_share))
            .collect()
    }

    pub fn allocated_share(&self) -> BTreeMap<ResourceKind, f64> {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, self.share.get(kind).allocated))
            .collect()
    }
}
