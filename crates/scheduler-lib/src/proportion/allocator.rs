//! Fair-share allocation across the queue hierarchy
//!
//! Capacity of every resource kind is divided among sibling queues in two
//! phases: each queue first receives its deserved quota (bounded by what it
//! requests and by its limit), then whatever is left is water-filled by
//! over-quota weight among queues that still want more. With full hierarchy
//! fairness the division recurses top-down; otherwise all leaf queues divide
//! the cluster directly and parents report the sum of their children.

use crate::models::{QueueId, ResourceKind, Resources};
use crate::resource_share::{QueueAttributes, QueueResourceShare, ResourceShare};
use crate::snapshot::{ClusterSnapshot, NodeInfo};
use std::collections::BTreeMap;

/// Remaining capacity below this is treated as exhausted
const EPSILON: f64 = 1e-9;

/// Start-up toggles that change how fair share is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorOptions {
    pub full_hierarchy_fairness: bool,
    pub restrict_node_scheduling: bool,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self {
            full_hierarchy_fairness: true,
            restrict_node_scheduling: false,
        }
    }
}

/// A queue's claim on one resource kind while dividing a parent's capacity
#[derive(Debug)]
struct Claim {
    id: QueueId,
    demand: f64,
    deserved: f64,
    weight: f64,
    fair_share: f64,
}

/// Computes fair share and allocation per queue and resource kind
#[derive(Debug, Clone, Default)]
pub struct FairShareAllocator {
    options: AllocatorOptions,
}

impl FairShareAllocator {
    pub fn new(options: AllocatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> AllocatorOptions {
        self.options
    }

    /// Capacity the queues divide, honouring restricted node scheduling
    pub fn capacity(&self, snapshot: &ClusterSnapshot) -> Resources {
        let mut capacity = Resources::default();
        for node in snapshot.nodes.values() {
            if !self.options.restrict_node_scheduling {
                capacity.add(&node.allocatable);
                continue;
            }
            if node.is_gpu_worker() {
                capacity.gpus += node.allocatable.gpus;
            }
            if counts_for_cpu(node) {
                capacity.milli_cpu += node.allocatable.milli_cpu;
                capacity.memory += node.allocatable.memory;
            }
        }
        capacity
    }

    pub fn allocate(&self, snapshot: &ClusterSnapshot) -> BTreeMap<QueueId, QueueAttributes> {
        let mut attributes = initial_attributes(snapshot);
        let bottom_up = bottom_up_order(snapshot);
        roll_up(&mut attributes, &bottom_up);

        let capacity = self.capacity(snapshot);
        for kind in ResourceKind::ALL {
            if self.options.full_hierarchy_fairness {
                let roots: Vec<QueueId> = snapshot.root_queues().map(|q| q.uid.clone()).collect();
                divide_recursive(&mut attributes, snapshot, &roots, capacity.get(kind), kind);
            } else {
                let leaves: Vec<QueueId> = snapshot.leaf_queues().map(|q| q.uid.clone()).collect();
                divide(&mut attributes, &leaves, capacity.get(kind), kind);
                sum_fair_share_into_parents(&mut attributes, &bottom_up, kind);
            }
        }

        tracing::debug!(
            queues = attributes.len(),
            gpu_capacity = capacity.gpus,
            hierarchical = self.options.full_hierarchy_fairness,
            "Computed fair share"
        );
        attributes
    }
}

fn counts_for_cpu(node: &NodeInfo) -> bool {
    node.is_cpu_worker() || node.is_gpu_worker()
}

fn initial_attributes(snapshot: &ClusterSnapshot) -> BTreeMap<QueueId, QueueAttributes> {
    let mut attributes: BTreeMap<QueueId, QueueAttributes> = snapshot
        .queues
        .values()
        .map(|queue| {
            let mut share = QueueResourceShare::default();
            for kind in ResourceKind::ALL {
                let quota = queue.quota(kind);
                *share.get_mut(kind) = ResourceShare {
                    deserved: quota.deserved,
                    max_allowed: quota.limit,
                    over_quota_weight: quota.over_quota_weight,
                    ..ResourceShare::default()
                };
            }
            let attrs = QueueAttributes {
                uid: queue.uid.clone(),
                name: queue.name.clone(),
                parent: queue.parent.clone(),
                children: queue.children.clone(),
                share,
            };
            (queue.uid.clone(), attrs)
        })
        .collect();

    for job in snapshot.pod_groups.values() {
        let Some(attrs) = attributes.get_mut(&job.queue) else {
            continue;
        };
        let requested = job.requested();
        let allocated = job.allocated();
        for kind in ResourceKind::ALL {
            let share = attrs.share.get_mut(kind);
            share.request += requested.get(kind);
            share.allocated += allocated.get(kind);
        }
    }
    attributes
}

/// Queue ids ordered deepest first, ties broken by id
fn bottom_up_order(snapshot: &ClusterSnapshot) -> Vec<QueueId> {
    let depth = |id: &QueueId| {
        let mut depth = 0usize;
        let mut current = snapshot.queues.get(id).and_then(|q| q.parent.as_ref());
        while let Some(parent) = current {
            depth += 1;
            current = snapshot.queues.get(parent).and_then(|q| q.parent.as_ref());
        }
        depth
    };
    let mut ids: Vec<(usize, QueueId)> = snapshot
        .queues
        .keys()
        .map(|id| (depth(id), id.clone()))
        .collect();
    ids.sort_by(|(da, a), (db, b)| db.cmp(da).then_with(|| a.cmp(b)));
    ids.into_iter().map(|(_, id)| id).collect()
}

/// Add each queue's request and allocation into its parent, deepest first
fn roll_up(attributes: &mut BTreeMap<QueueId, QueueAttributes>, bottom_up: &[QueueId]) {
    for id in bottom_up {
        let Some(queue) = attributes.get(id) else {
            continue;
        };
        let Some(parent) = queue.parent.clone() else {
            continue;
        };
        let totals = queue.share;
        if let Some(parent) = attributes.get_mut(&parent) {
            for kind in ResourceKind::ALL {
                let share = parent.share.get_mut(kind);
                share.request += totals.get(kind).request;
                share.allocated += totals.get(kind).allocated;
            }
        }
    }
}

fn sum_fair_share_into_parents(
    attributes: &mut BTreeMap<QueueId, QueueAttributes>,
    bottom_up: &[QueueId],
    kind: ResourceKind,
) {
    for id in bottom_up {
        let Some(queue) = attributes.get(id) else {
            continue;
        };
        let (Some(parent), fair_share) = (queue.parent.clone(), queue.share.get(kind).fair_share)
        else {
            continue;
        };
        if let Some(parent) = attributes.get_mut(&parent) {
            parent.share.get_mut(kind).fair_share += fair_share;
        }
    }
}

fn divide_recursive(
    attributes: &mut BTreeMap<QueueId, QueueAttributes>,
    snapshot: &ClusterSnapshot,
    siblings: &[QueueId],
    capacity: f64,
    kind: ResourceKind,
) {
    divide(attributes, siblings, capacity, kind);
    for id in siblings {
        let Some(queue) = snapshot.queues.get(id) else {
            continue;
        };
        if queue.children.is_empty() {
            continue;
        }
        let parent_share = attributes
            .get(id)
            .map(|attrs| attrs.share.get(kind).fair_share)
            .unwrap_or(0.0);
        divide_recursive(attributes, snapshot, &queue.children, parent_share, kind);
    }
}

/// Divide `capacity` of one resource kind among sibling queues
fn divide(
    attributes: &mut BTreeMap<QueueId, QueueAttributes>,
    siblings: &[QueueId],
    capacity: f64,
    kind: ResourceKind,
) {
    let mut claims: Vec<Claim> = siblings
        .iter()
        .filter_map(|id| attributes.get(id))
        .map(|attrs| {
            let share = attrs.share.get(kind);
            let demand = share.request.min(share.max_allowed.unwrap_or(f64::INFINITY));
            Claim {
                id: attrs.uid.clone(),
                demand,
                deserved: share.deserved,
                weight: share.over_quota_weight,
                fair_share: 0.0,
            }
        })
        .collect();

    // Deserved quotas, scaled down when they oversubscribe the capacity
    for claim in claims.iter_mut() {
        claim.fair_share = claim.deserved.min(claim.demand);
    }
    let guaranteed: f64 = claims.iter().map(|c| c.fair_share).sum();
    if guaranteed > capacity && guaranteed > 0.0 {
        let scale = capacity / guaranteed;
        for claim in claims.iter_mut() {
            claim.fair_share *= scale;
        }
    }
    let mut remaining = (capacity - claims.iter().map(|c| c.fair_share).sum::<f64>()).max(0.0);

    // Over-quota water-filling by weight
    while remaining > EPSILON {
        let hungry: Vec<usize> = claims
            .iter()
            .enumerate()
            .filter(|(_, c)| c.weight > 0.0 && c.fair_share + EPSILON < c.demand)
            .map(|(i, _)| i)
            .collect();
        if hungry.is_empty() {
            break;
        }
        let total_weight: f64 = hungry.iter().map(|i| claims[*i].weight).sum();
        let mut granted = 0.0;
        for i in hungry {
            let claim = &mut claims[i];
            let portion = remaining * claim.weight / total_weight;
            let grant = portion.min(claim.demand - claim.fair_share);
            claim.fair_share += grant;
            granted += grant;
        }
        remaining -= granted;
        if granted <= EPSILON {
            break;
        }
    }

    for claim in claims {
        if let Some(attrs) = attributes.get_mut(&claim.id) {
            attrs.share.get_mut(kind).fair_share = claim.fair_share;
        }
    }
}
