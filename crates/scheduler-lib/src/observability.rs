//! Observability infrastructure for the scheduler
//!
//! Provides:
//! - Prometheus metrics (session latency, session outcomes, queue shares, reclaim plan size)
//! - A structured logger passed explicitly to the components that emit scheduler events

use crate::framework::ReclaimPlan;
use crate::resource_share::QueueAttributes;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for session latency (in seconds)
const SESSION_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

static GLOBAL_METRICS: OnceLock<SchedulerMetricsInner> = OnceLock::new();

struct SchedulerMetricsInner {
    session_latency_seconds: Histogram,
    sessions_opened: IntCounter,
    sessions_failed: IntCounter,
    queue_fair_share: GaugeVec,
    queue_allocated: GaugeVec,
    reclaimers: IntGauge,
    victims: IntGauge,
}

impl SchedulerMetricsInner {
    fn new() -> Self {
        Self {
            session_latency_seconds: register_histogram!(
                "reclaim_scheduler_session_latency_seconds",
                "Time spent in one scheduling session from open to close",
                SESSION_BUCKETS.to_vec()
            )
            .expect("Failed to register session_latency_seconds"),

            sessions_opened: register_int_counter!(
                "reclaim_scheduler_sessions_opened_total",
                "Total number of scheduling sessions that reached the active state"
            )
            .expect("Failed to register sessions_opened"),

            sessions_failed: register_int_counter!(
                "reclaim_scheduler_sessions_failed_total",
                "Total number of scheduling cycles aborted before publishing an order"
            )
            .expect("Failed to register sessions_failed"),

            queue_fair_share: register_gauge_vec!(
                "reclaim_scheduler_queue_fair_share",
                "Fair share computed for a queue in the last session",
                &["queue", "resource"]
            )
            .expect("Failed to register queue_fair_share"),

            queue_allocated: register_gauge_vec!(
                "reclaim_scheduler_queue_allocated",
                "Resources allocated to a queue in the last session",
                &["queue", "resource"]
            )
            .expect("Failed to register queue_allocated"),

            reclaimers: register_int_gauge!(
                "reclaim_scheduler_reclaimers",
                "Pending jobs ordered for reclaim in the last session"
            )
            .expect("Failed to register reclaimers"),

            victims: register_int_gauge!(
                "reclaim_scheduler_victims",
                "Running jobs ordered as reclaim victims in the last session"
            )
            .expect("Failed to register victims"),
        }
    }
}

/// Scheduler metrics for Prometheus exposition
///
/// A lightweight handle to the process-wide metrics; clones share them.
#[derive(Clone)]
pub struct SchedulerMetrics {
    _private: (),
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SchedulerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SchedulerMetricsInner {
        GLOBAL_METRICS.get_or_init(SchedulerMetricsInner::new)
    }

    pub fn observe_session_latency(&self, duration_secs: f64) {
        self.inner().session_latency_seconds.observe(duration_secs);
    }

    pub fn inc_sessions_opened(&self) {
        self.inner().sessions_opened.inc();
    }

    pub fn inc_sessions_failed(&self) {
        self.inner().sessions_failed.inc();
    }

    /// Publish fair share and allocation of every queue
    pub fn set_queue_shares<'a>(&self, queues: impl IntoIterator<Item = &'a QueueAttributes>) {
        let inner = self.inner();
        inner.queue_fair_share.reset();
        inner.queue_allocated.reset();
        for queue in queues {
            for kind in crate::models::ResourceKind::ALL {
                let share = queue.share.get(kind);
                let labels = [queue.uid.as_str(), kind.as_str()];
                inner
                    .queue_fair_share
                    .with_label_values(&labels)
                    .set(share.fair_share);
                inner
                    .queue_allocated
                    .with_label_values(&labels)
                    .set(share.allocated);
            }
        }
    }

    pub fn set_reclaim_plan(&self, plan: &ReclaimPlan) {
        self.inner().reclaimers.set(plan.reclaimers.len() as i64);
        self.inner().victims.set(plan.victims.len() as i64);
    }
}

/// Structured logger for scheduler events
///
/// Constructed once at start-up and handed to the scheduler and, through
/// the session, to plugins.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    scheduler_name: String,
}

impl StructuredLogger {
    pub fn new(scheduler_name: impl Into<String>) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
        }
    }

    pub fn scheduler_name(&self) -> &str {
        &self.scheduler_name
    }

    pub fn log_startup(&self, version: &str, plugins: &[String]) {
        info!(
            event = "scheduler_started",
            scheduler = %self.scheduler_name,
            version = %version,
            plugins = ?plugins,
            "Scheduler started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "scheduler_shutdown",
            scheduler = %self.scheduler_name,
            reason = %reason,
            "Scheduler shutting down"
        );
    }

    pub fn log_session_opened(&self, session_id: &str, plugins: usize, jobs: usize, nodes: usize) {
        info!(
            event = "session_opened",
            scheduler = %self.scheduler_name,
            session = %session_id,
            plugins = plugins,
            jobs = jobs,
            nodes = nodes,
            "Session opened"
        );
    }

    pub fn log_session_closed(&self, session_id: &str, duration_secs: f64) {
        debug!(
            event = "session_closed",
            scheduler = %self.scheduler_name,
            session = %session_id,
            duration_secs = duration_secs,
            "Session closed"
        );
    }

    pub fn log_plugin_failure(&self, session_id: &str, plugin: &str, error: &str) {
        warn!(
            event = "plugin_failed",
            scheduler = %self.scheduler_name,
            session = %session_id,
            plugin = %plugin,
            error = %error,
            "Plugin failed to open session"
        );
    }

    pub fn log_queue_share(&self, session_id: &str, queue: &QueueAttributes) {
        debug!(
            event = "queue_share",
            scheduler = %self.scheduler_name,
            session = %session_id,
            queue = %queue.uid,
            gpu_fair_share = queue.share.gpu.fair_share,
            gpu_allocated = queue.share.gpu.allocated,
            gpu_request = queue.share.gpu.request,
            over_allocated = queue.share.gpu.is_over_allocated(),
            "Queue share computed"
        );
    }

    pub fn log_reclaim_plan(&self, plan: &ReclaimPlan) {
        info!(
            event = "reclaim_plan",
            scheduler = %self.scheduler_name,
            session = %plan.session_id,
            reclaimers = plan.reclaimers.len(),
            victims = plan.victims.len(),
            first_reclaimer = ?plan.reclaimers.first(),
            first_victim = ?plan.victims.first(),
            "Reclaim plan computed"
        );
    }

    pub fn log_cycle_failure(&self, cycle: u64, error: &str) {
        warn!(
            event = "cycle_failed",
            scheduler = %self.scheduler_name,
            cycle = cycle,
            error = %error,
            "Scheduling cycle aborted"
        );
    }
}
