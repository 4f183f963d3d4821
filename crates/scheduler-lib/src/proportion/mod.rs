//! Proportional fair share and reclaim ordering
//!
//! The proportion plugin computes per-queue fair share for the session,
//! records the resulting [`QueueAttributes`] and registers the orders the
//! reclaim action consumes.

mod allocator;
mod reclaim_order;

pub use allocator::{AllocatorOptions, FairShareAllocator};
pub use reclaim_order::{queue_over_allocation_score, NodeStarvationOrder, DEFAULT_STARVATION_FACTOR};

use crate::error::PluginError;
use crate::framework::{plugin_argument, Plugin, PluginArguments, Session};
use crate::models::QueueId;
use crate::resource_share::QueueAttributes;
use crate::snapshot::PodGroupInfo;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const PLUGIN_NAME: &str = "proportion";

/// Argument overriding the multiplier for queues without GPU fair share
pub const STARVATION_FACTOR_ARG: &str = "starvationFactor";

/// Prefers pending jobs from the least over-allocated queue
#[derive(Debug, Clone)]
struct QueueShareOrder {
    scores: BTreeMap<QueueId, f64>,
}

impl QueueShareOrder {
    fn new(queues: &BTreeMap<QueueId, QueueAttributes>, starvation_factor: f64) -> Self {
        let scores = queues
            .values()
            .map(|q| {
                let score = queue_over_allocation_score(&q.share.gpu, starvation_factor);
                (q.uid.clone(), score)
            })
            .collect();
        Self { scores }
    }

    fn score(&self, job: &PodGroupInfo) -> f64 {
        self.scores.get(&job.queue).copied().unwrap_or(0.0)
    }

    fn compare(&self, l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
        self.score(r)
            .partial_cmp(&self.score(l))
            .unwrap_or(Ordering::Equal)
    }
}

pub struct ProportionPlugin {
    arguments: PluginArguments,
}

impl ProportionPlugin {
    pub fn new(arguments: PluginArguments) -> Self {
        Self { arguments }
    }

    pub fn build(arguments: &PluginArguments) -> Box<dyn Plugin> {
        Box::new(Self::new(arguments.clone()))
    }

    fn starvation_factor(&self) -> Result<f64, PluginError> {
        let Some(raw) = plugin_argument(&self.arguments, STARVATION_FACTOR_ARG) else {
            return Ok(DEFAULT_STARVATION_FACTOR);
        };
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
            _ => Err(PluginError::InvalidArgument {
                plugin: PLUGIN_NAME.to_string(),
                key: STARVATION_FACTOR_ARG.to_string(),
                value: raw.clone(),
            }),
        }
    }
}

impl Plugin for ProportionPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn on_session_open(&mut self, ssn: &mut Session) -> Result<(), PluginError> {
        let starvation_factor = self.starvation_factor()?;
        let options = ssn.options();
        let allocator = FairShareAllocator::new(AllocatorOptions {
            full_hierarchy_fairness: options.full_hierarchy_fairness,
            restrict_node_scheduling: options.restrict_node_scheduling,
        });

        let queues = allocator.allocate(ssn.snapshot());
        for queue in queues.values() {
            ssn.logger().log_queue_share(ssn.uid(), queue);
        }

        let snapshot = ssn.snapshot();
        let victims = NodeStarvationOrder::new(
            &queues,
            &snapshot.nodes,
            &snapshot.pod_groups,
            starvation_factor,
        );
        let pending = QueueShareOrder::new(&queues, starvation_factor);

        ssn.set_queue_attributes(queues)?;
        ssn.add_victim_order_fn("node-starvation", victims)?;
        ssn.add_job_order_fn("queue-share", move |l: &PodGroupInfo, r: &PodGroupInfo| {
            pending.compare(l, r)
        })?;
        Ok(())
    }

    fn on_session_close(&mut self, ssn: &mut Session) {
        tracing::debug!(session_id = %ssn.uid(), plugin = PLUGIN_NAME, "Closing plugin");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::framework::{
        Cache, HttpHandlerRegistry, SchedulerCache, SessionOptions, SessionState,
    };
    use crate::models::{PodGroupId, ResourceKind, Resources};
    use crate::observability::StructuredLogger;
    use crate::snapshot::{ClusterState, NodeInfo, PodInfo, QueueInfo, QueueQuota};
    use std::sync::Arc;

    /// Two queues deserving 2 GPUs each on a 4 GPU cluster; queue1 runs 3
    /// while queue2 waits for 2.
    fn state() -> ClusterState {
        ClusterState {
            queues: vec![
                QueueInfo::new("queue1").with_quota(ResourceKind::Gpu, QueueQuota::deserved(2.0)),
                QueueInfo::new("queue2").with_quota(ResourceKind::Gpu, QueueQuota::deserved(2.0)),
            ],
            nodes: vec![
                NodeInfo::new("node1", Resources::with_gpus(2.0)),
                NodeInfo::new("node2", Resources::with_gpus(2.0)),
            ],
            pod_groups: vec![
                PodGroupInfo::new("big", "queue1"),
                PodGroupInfo::new("small", "queue1"),
                PodGroupInfo::new("waiting-1", "queue1"),
                PodGroupInfo::new("waiting-2", "queue2"),
            ],
            pods: vec![
                PodInfo::new("big-0", "big", Resources::with_gpus(2.0)).bound_to("node1"),
                PodInfo::new("small-0", "small", Resources::with_gpus(1.0)).bound_to("node2"),
                PodInfo::new("w1-0", "waiting-1", Resources::with_gpus(1.0)),
                PodInfo::new("w2-0", "waiting-2", Resources::with_gpus(1.0)),
                PodInfo::new("w2-1", "waiting-2", Resources::with_gpus(1.0)),
            ],
        }
    }

    async fn open(
        arguments: PluginArguments,
    ) -> (Result<Session, SessionError>, Vec<Box<dyn Plugin>>) {
        let cache: Arc<dyn Cache> = Arc::new(SchedulerCache::new(state()));
        let mut plugins = vec![ProportionPlugin::build(&arguments)];
        let ssn = Session::open(
            "proportion-test",
            cache,
            &mut plugins,
            HttpHandlerRegistry::new(),
            SessionOptions::default(),
            StructuredLogger::new("test"),
        )
        .await;
        (ssn, plugins)
    }

    #[tokio::test]
    async fn test_records_queue_attributes() {
        let (ssn, _) = open(PluginArguments::new()).await;
        let ssn = ssn.unwrap();

        let queues = ssn.queue_attributes();
        let queue1 = &queues[&QueueId::new("queue1")].share.gpu;
        let queue2 = &queues[&QueueId::new("queue2")].share.gpu;
        assert_eq!(queue1.allocated, 3.0);
        assert_eq!(queue1.fair_share, 2.0);
        assert_eq!(queue2.allocated, 0.0);
        assert!(queue1.is_over_allocated());
    }

    #[tokio::test]
    async fn test_plan_prefers_starved_queue_and_crowded_node() {
        let (ssn, mut plugins) = open(PluginArguments::new()).await;
        let mut ssn = ssn.unwrap();

        let plan = ssn.reclaim_plan().unwrap();
        assert_eq!(
            plan.reclaimers,
            vec![PodGroupId::new("waiting-2"), PodGroupId::new("waiting-1")]
        );
        // both run in queue1; big fills its node with queue1 GPUs
        assert_eq!(
            plan.victims,
            vec![PodGroupId::new("big"), PodGroupId::new("small")]
        );

        ssn.close(&mut plugins);
        assert_eq!(ssn.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_invalid_starvation_factor_fails_open() {
        let mut arguments = PluginArguments::new();
        arguments.insert(STARVATION_FACTOR_ARG.to_string(), "lots".to_string());

        let (ssn, _) = open(arguments).await;
        match ssn {
            Err(SessionError::PluginOpen { plugin, source }) => {
                assert_eq!(plugin, PLUGIN_NAME);
                assert!(matches!(source, PluginError::InvalidArgument { .. }));
            }
            other => panic!("expected plugin failure, got {:?}", other.map(|s| s.uid().to_string())),
        }
    }

    #[test]
    fn test_starvation_factor_argument() {
        let mut arguments = PluginArguments::new();
        arguments.insert(STARVATION_FACTOR_ARG.to_string(), " 12.5 ".to_string());
        arguments.insert("unrelated".to_string(), "ignored".to_string());
        assert_eq!(ProportionPlugin::new(arguments).starvation_factor(), Ok(12.5));

        let plugin = ProportionPlugin::new(PluginArguments::new());
        assert_eq!(plugin.starvation_factor(), Ok(DEFAULT_STARVATION_FACTOR));
    }
}
