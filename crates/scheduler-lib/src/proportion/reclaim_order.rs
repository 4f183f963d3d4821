//! Reclaim ordering by node starvation
//!
//! Each queue gets an over-allocation score (allocated GPUs over fair share
//! GPUs). Each node accumulates the scores of the queues whose pods occupy
//! it, weighted by the GPUs those pods request. A job's score is the average
//! node score over all of its pods, so jobs sitting on nodes crowded by
//! over-allocated queues compare as better reclaim candidates.
//!
//! Scores are computed once when the order is built and never recomputed,
//! so a full sort over one snapshot sees a consistent total order.

use crate::framework::JobComparator;
use crate::models::{PodGroupId, QueueId};
use crate::resource_share::{QueueAttributes, ResourceShare};
use crate::snapshot::{NodeInfo, PodGroupInfo};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Multiplier applied to allocated GPUs of a queue that has no GPU fair share
pub const DEFAULT_STARVATION_FACTOR: f64 = 100.0;

/// Over-allocation score of a queue's GPU share.
///
/// A queue without fair share is scored `allocated * starvation_factor`
/// instead of dividing by zero.
pub fn queue_over_allocation_score(gpu: &ResourceShare, starvation_factor: f64) -> f64 {
    match gpu.allocation_ratio() {
        Some(ratio) => ratio,
        None => gpu.allocated * starvation_factor,
    }
}

/// Precomputed queue and node scores for one scheduling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeStarvationOrder {
    starvation_factor: f64,
    queue_scores: BTreeMap<QueueId, f64>,
    node_scores: BTreeMap<String, f64>,
}

impl NodeStarvationOrder {
    pub fn new(
        queues: &BTreeMap<QueueId, QueueAttributes>,
        nodes: &BTreeMap<String, NodeInfo>,
        jobs: &BTreeMap<PodGroupId, PodGroupInfo>,
        starvation_factor: f64,
    ) -> Self {
        let queue_scores: BTreeMap<QueueId, f64> = queues
            .values()
            .map(|queue| {
                let score = queue_over_allocation_score(&queue.share.gpu, starvation_factor);
                (queue.uid.clone(), score)
            })
            .collect();

        let mut node_scores = BTreeMap::new();
        for node in nodes.values() {
            let mut score = 0.0;
            for pod in node.pod_infos.values() {
                let pod_gpus = pod.res_req.gpus();
                if pod_gpus <= 0.0 || pod.job.is_empty() {
                    continue;
                }
                let queue_score = jobs
                    .get(&pod.job)
                    .and_then(|job| queue_scores.get(&job.queue))
                    .copied()
                    .unwrap_or(0.0);
                score += queue_score * pod_gpus;
            }
            node_scores.insert(node.name.clone(), score);
        }

        Self {
            starvation_factor,
            queue_scores,
            node_scores,
        }
    }

    pub fn starvation_factor(&self) -> f64 {
        self.starvation_factor
    }

    pub fn queue_score(&self, queue: &QueueId) -> f64 {
        self.queue_scores.get(queue).copied().unwrap_or(0.0)
    }

    pub fn node_score(&self, node_name: &str) -> f64 {
        self.node_scores.get(node_name).copied().unwrap_or(0.0)
    }

    /// Average node score over every pod of the job.
    ///
    /// Unbound pods add nothing to the sum but still count in the divisor.
    /// A job without pods scores zero; the session rejects such jobs before
    /// ordering them.
    pub fn job_score(&self, job: &PodGroupInfo) -> f64 {
        if job.pod_infos.is_empty() {
            return 0.0;
        }
        let total: f64 = job
            .bound_pods()
            .map(|pod| self.node_score(&pod.node_name))
            .sum();
        total / job.pod_infos.len() as f64
    }

    /// Greater when `l` sits in a more over-allocated context than `r`
    pub fn compare(&self, l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
        self.job_score(l)
            .partial_cmp(&self.job_score(r))
            .unwrap_or(Ordering::Equal)
    }
}

impl JobComparator for NodeStarvationOrder {
    fn compare(&self, l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
        NodeStarvationOrder::compare(self, l, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resources;
    use crate::resource_share::QueueResourceShare;
    use crate::snapshot::PodInfo;
    use std::sync::Arc;

    fn queue(uid: &str, fair_share: f64, allocated: f64) -> (QueueId, QueueAttributes) {
        let attrs = QueueAttributes::new(
            uid,
            QueueResourceShare {
                gpu: ResourceShare::new(fair_share, allocated),
                cpu: ResourceShare::empty(),
                memory: ResourceShare::empty(),
            },
        );
        (QueueId::new(uid), attrs)
    }

    fn job(uid: &str, queue: &str, pods: Vec<PodInfo>) -> PodGroupInfo {
        pods.into_iter()
            .fold(PodGroupInfo::new(uid, queue), |group, pod| group.with_pod(pod))
    }

    fn gpu_pod(uid: &str, job: &str, node: &str, gpus: f64) -> PodInfo {
        PodInfo::new(uid, job, Resources::with_gpus(gpus)).bound_to(node)
    }

    fn node_with(name: &str, jobs: &[&PodGroupInfo]) -> (String, NodeInfo) {
        let mut node = NodeInfo::new(name, Resources::with_gpus(2.0));
        for job in jobs {
            for pod in job.pod_infos.values() {
                if pod.node_name == name {
                    node.pod_infos.insert(pod.uid.clone(), Arc::clone(pod));
                }
            }
        }
        (name.to_string(), node)
    }

    struct Fixture {
        order: NodeStarvationOrder,
        jobs: BTreeMap<PodGroupId, PodGroupInfo>,
    }

    impl Fixture {
        fn job(&self, uid: &str) -> &PodGroupInfo {
            &self.jobs[&PodGroupId::new(uid)]
        }
    }

    fn two_queue_fixture(q1: (f64, f64), q2: (f64, f64)) -> Fixture {
        let queues: BTreeMap<_, _> = [queue("queue1", q1.0, q1.1), queue("queue2", q2.0, q2.1)]
            .into_iter()
            .collect();

        let job1 = job("job1", "queue1", vec![gpu_pod("pod1", "job1", "node1", 2.0)]);
        let job2 = job("job2", "queue2", vec![gpu_pod("pod2", "job2", "node2", 2.0)]);
        let nodes: BTreeMap<_, _> = [node_with("node1", &[&job1]), node_with("node2", &[&job2])]
            .into_iter()
            .collect();

        let mut jobs = BTreeMap::new();
        jobs.insert(job1.uid.clone(), job1);
        jobs.insert(job2.uid.clone(), job2);
        jobs.insert(
            PodGroupId::new("job3"),
            job(
                "job3",
                "queue1",
                vec![PodInfo::new("pod3", "job3", Resources::with_gpus(2.0))],
            ),
        );

        let order = NodeStarvationOrder::new(&queues, &nodes, &jobs, DEFAULT_STARVATION_FACTOR);
        Fixture { order, jobs }
    }

    fn assert_reference_outcome(fixture: &Fixture) {
        let (job1, job2, job3) = (fixture.job("job1"), fixture.job("job2"), fixture.job("job3"));

        assert_eq!(fixture.order.compare(job1, job2), Ordering::Greater);
        assert_eq!(fixture.order.compare(job2, job1), Ordering::Less);
        assert_eq!(fixture.order.compare(job1, job1), Ordering::Equal);
        // job3 has no bound pods
        assert_eq!(fixture.order.compare(job3, job1), Ordering::Less);
    }

    #[test]
    fn test_queue1_higher_allocated() {
        // queue1: 0.4 / 0.5 = 0.8, queue2: 0.2 / 0.5 = 0.4
        let fixture = two_queue_fixture((0.5, 0.4), (0.5, 0.2));

        assert!((fixture.order.queue_score(&QueueId::new("queue1")) - 0.8).abs() < 1e-12);
        assert!((fixture.order.node_score("node1") - 1.6).abs() < 1e-12);
        assert_reference_outcome(&fixture);
    }

    #[test]
    fn test_queue1_lower_fair_share() {
        // queue1: 0.2 / 0.5 = 0.4, queue2: 0.2 / 2 = 0.1
        let fixture = two_queue_fixture((0.5, 0.2), (2.0, 0.2));

        assert!((fixture.order.queue_score(&QueueId::new("queue2")) - 0.1).abs() < 1e-12);
        assert_reference_outcome(&fixture);
    }

    #[test]
    fn test_comparator_is_antisymmetric_and_deterministic() {
        let fixture = two_queue_fixture((0.5, 0.4), (0.5, 0.2));
        let jobs: Vec<&PodGroupInfo> = fixture.jobs.values().collect();

        for l in &jobs {
            assert_eq!(fixture.order.compare(l, l), Ordering::Equal);
            for r in &jobs {
                assert_eq!(
                    fixture.order.compare(l, r),
                    fixture.order.compare(r, l).reverse()
                );
            }
        }

        let again = two_queue_fixture((0.5, 0.4), (0.5, 0.2));
        assert_eq!(fixture.order, again.order);
    }

    #[test]
    fn test_zero_fair_share_saturates_to_finite_score() {
        let starved = ResourceShare::new(0.0, 1.0);
        let funded = ResourceShare::new(1.0, 1.0);

        let score = queue_over_allocation_score(&starved, DEFAULT_STARVATION_FACTOR);
        assert!(score.is_finite());
        assert_eq!(score, 100.0);
        assert!(score > queue_over_allocation_score(&funded, DEFAULT_STARVATION_FACTOR));

        assert_eq!(queue_over_allocation_score(&starved, 7.0), 7.0);
        assert_eq!(queue_over_allocation_score(&ResourceShare::empty(), 7.0), 0.0);
    }

    #[test]
    fn test_zero_fair_share_queue_is_preferred_victim() {
        let fixture = two_queue_fixture((0.0, 0.5), (0.5, 0.5));

        assert_eq!(
            fixture.order.compare(fixture.job("job1"), fixture.job("job2")),
            Ordering::Greater
        );
    }

    #[test]
    fn test_unbound_pods_count_toward_divisor() {
        let queues: BTreeMap<_, _> = [queue("queue1", 1.0, 1.0)].into_iter().collect();
        let half_bound = job(
            "half",
            "queue1",
            vec![
                gpu_pod("a", "half", "node1", 1.0),
                PodInfo::new("b", "half", Resources::with_gpus(1.0)),
            ],
        );
        let nodes: BTreeMap<_, _> = [node_with("node1", &[&half_bound])].into_iter().collect();
        let jobs: BTreeMap<_, _> = [(half_bound.uid.clone(), half_bound.clone())]
            .into_iter()
            .collect();

        let order = NodeStarvationOrder::new(&queues, &nodes, &jobs, DEFAULT_STARVATION_FACTOR);

        assert_eq!(order.node_score("node1"), 1.0);
        assert_eq!(order.job_score(&half_bound), 0.5);
    }

    #[test]
    fn test_node_score_skips_cpu_only_and_jobless_pods() {
        let queues: BTreeMap<_, _> = [queue("queue1", 1.0, 2.0)].into_iter().collect();
        let gpu_job = job("gpu", "queue1", vec![gpu_pod("g", "gpu", "node1", 1.0)]);
        let cpu_job = job(
            "cpu",
            "queue1",
            vec![PodInfo::new("c", "cpu", Resources::new(1000.0, 0.0, 0.0)).bound_to("node1")],
        );
        let mut nodes: BTreeMap<_, _> = [node_with("node1", &[&gpu_job, &cpu_job])]
            .into_iter()
            .collect();
        let loose = Arc::new(gpu_pod("loose", "", "node1", 4.0));
        nodes
            .get_mut("node1")
            .unwrap()
            .pod_infos
            .insert(loose.uid.clone(), loose);

        let jobs: BTreeMap<_, _> = [
            (gpu_job.uid.clone(), gpu_job),
            (cpu_job.uid.clone(), cpu_job),
        ]
        .into_iter()
        .collect();
        let order = NodeStarvationOrder::new(&queues, &nodes, &jobs, DEFAULT_STARVATION_FACTOR);

        assert_eq!(order.node_score("node1"), 2.0);
    }

    #[test]
    fn test_more_over_allocated_queue_is_preferred_on_identical_layout() {
        for (q1, q2) in [((1.0, 3.0), (1.0, 2.0)), ((2.0, 1.0), (4.0, 1.0))] {
            let fixture = two_queue_fixture(q1, q2);
            assert_eq!(
                fixture.order.compare(fixture.job("job1"), fixture.job("job2")),
                Ordering::Greater
            );
        }
    }
}
