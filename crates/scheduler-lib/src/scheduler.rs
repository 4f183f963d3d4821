//! Scheduling loop
//!
//! Every period the scheduler instantiates the configured plugins, opens a
//! session over a fresh snapshot, computes the reclaim plan and closes the
//! session again. A failed cycle is logged and counted; the next tick starts
//! from scratch.

use crate::error::SessionError;
use crate::framework::{
    Cache, HttpHandlerRegistry, PluginOption, PluginRegistry, ReclaimPlan, Session,
    SessionOptions,
};
use crate::health::{components, HealthRegistry};
use crate::observability::{SchedulerMetrics, StructuredLogger};
use crate::resource_share::QueueAttributes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

pub const DEFAULT_SCHEDULE_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub schedule_period: Duration,
    pub session_options: SessionOptions,
    pub plugins: Vec<PluginOption>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            schedule_period: DEFAULT_SCHEDULE_PERIOD,
            session_options: SessionOptions::default(),
            plugins: ["priority", "proportion", "gang", "snapshot"]
                .into_iter()
                .map(PluginOption::new)
                .collect(),
        }
    }
}

/// Outcome of one successful cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub plan: ReclaimPlan,
    pub queues: Vec<QueueAttributes>,
    pub duration_secs: f64,
}

pub struct Scheduler {
    cache: Arc<dyn Cache>,
    registry: PluginRegistry,
    settings: SchedulerSettings,
    http_handlers: HttpHandlerRegistry,
    health: HealthRegistry,
    metrics: SchedulerMetrics,
    logger: StructuredLogger,
    cycles: AtomicU64,
    last_report: RwLock<Option<CycleReport>>,
}

impl Scheduler {
    pub fn new(
        cache: Arc<dyn Cache>,
        registry: PluginRegistry,
        settings: SchedulerSettings,
        http_handlers: HttpHandlerRegistry,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            cache,
            registry,
            settings,
            http_handlers,
            health,
            metrics: SchedulerMetrics::new(),
            logger,
            cycles: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Run a single scheduling cycle
    pub async fn run_once(&self) -> Result<CycleReport, SessionError> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let mut plugins = self.registry.build(&self.settings.plugins)?;

        let mut ssn = Session::open(
            format!("{}-{}", self.logger.scheduler_name(), cycle),
            Arc::clone(&self.cache),
            &mut plugins,
            self.http_handlers.clone(),
            self.settings.session_options,
            self.logger.clone(),
        )
        .await?;
        self.metrics.inc_sessions_opened();

        let plan = ssn.reclaim_plan();
        let queues: Vec<QueueAttributes> = ssn.queue_attributes().values().cloned().collect();
        ssn.close(&mut plugins);

        let duration_secs = started.elapsed().as_secs_f64();
        self.metrics.observe_session_latency(duration_secs);
        let plan = plan?;

        self.metrics.set_queue_shares(&queues);
        self.metrics.set_reclaim_plan(&plan);
        self.logger.log_reclaim_plan(&plan);

        let report = CycleReport {
            cycle,
            plan,
            queues,
            duration_secs,
        };
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    async fn record(&self, result: &Result<CycleReport, SessionError>) {
        match result {
            Ok(_) => {
                self.health.set_healthy(components::CACHE).await;
                self.health.set_healthy(components::SCHEDULER).await;
                self.health.set_ready(true).await;
            }
            Err(e) => {
                let cycle = self.cycles.load(Ordering::SeqCst);
                self.metrics.inc_sessions_failed();
                self.logger.log_cycle_failure(cycle, &e.to_string());
                if let SessionError::Cache(cache_err) = e {
                    self.health
                        .set_unhealthy(components::CACHE, cache_err.to_string())
                        .await;
                }
                self.health
                    .set_degraded(components::SCHEDULER, format!("cycle {} failed: {}", cycle, e))
                    .await;
            }
        }
    }

    /// Tick until `shutdown` fires
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            period_ms = self.settings.schedule_period.as_millis() as u64,
            plugins = self.settings.plugins.len(),
            "Starting scheduling loop"
        );
        self.health.register(components::CACHE).await;
        self.health.register(components::SCHEDULER).await;

        let mut ticker = interval(self.settings.schedule_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = self.run_once().await;
                    self.record(&result).await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down scheduling loop");
                    break;
                }
            }
        }
    }
}
