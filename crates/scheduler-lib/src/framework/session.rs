//! One scheduling cycle
//!
//! Lifecycle: `Created -> Open -> Active -> Closed`. Plugins register while
//! the session is open; orderings are only served once it is active; a
//! closed session is never reopened.

use super::{Cache, HttpHandler, HttpHandlerRegistry, JobComparator, JobFilter, Plugin};
use crate::error::SessionError;
use crate::models::{PodGroupId, QueueId};
use crate::observability::StructuredLogger;
use crate::resource_share::QueueAttributes;
use crate::snapshot::{ClusterSnapshot, PodGroupInfo};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Open,
    Active,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Open => "open",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process start-up toggles visible to plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub full_hierarchy_fairness: bool,
    pub restrict_node_scheduling: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            full_hierarchy_fairness: true,
            restrict_node_scheduling: false,
        }
    }
}

/// Orderings published by an active session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReclaimPlan {
    pub session_id: String,
    /// Pending jobs, most deserving first
    pub reclaimers: Vec<PodGroupId>,
    /// Running jobs of over-allocated queues, first to evict first
    pub victims: Vec<PodGroupId>,
}

type Named<T> = (String, Box<T>);

/// The live context of one scheduling cycle
pub struct Session {
    uid: String,
    state: SessionState,
    opened_at: Instant,
    snapshot: Arc<ClusterSnapshot>,
    cache: Arc<dyn Cache>,
    http_handlers: HttpHandlerRegistry,
    /// Registered while open, published to `http_handlers` on activation
    pending_handlers: Vec<(String, Arc<dyn HttpHandler>)>,
    options: SessionOptions,
    logger: StructuredLogger,
    queue_attributes: BTreeMap<QueueId, QueueAttributes>,
    job_order_fns: Vec<Named<dyn JobComparator>>,
    victim_order_fns: Vec<Named<dyn JobComparator>>,
    job_filters: Vec<Named<dyn JobFilter>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("state", &self.state)
            .field("job_order_fns", &self.job_order_fns.len())
            .field("victim_order_fns", &self.victim_order_fns.len())
            .field("job_filters", &self.job_filters.len())
            .field("pending_handlers", &self.pending_handlers.len())
            .finish()
    }
}

impl Session {
    pub fn new(
        uid: impl Into<String>,
        snapshot: ClusterSnapshot,
        cache: Arc<dyn Cache>,
        http_handlers: HttpHandlerRegistry,
        options: SessionOptions,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            uid: uid.into(),
            state: SessionState::Created,
            opened_at: Instant::now(),
            snapshot: Arc::new(snapshot),
            cache,
            http_handlers,
            pending_handlers: Vec::new(),
            options,
            logger,
            queue_attributes: BTreeMap::new(),
            job_order_fns: Vec::new(),
            victim_order_fns: Vec::new(),
            job_filters: Vec::new(),
        }
    }

    /// Take a snapshot from the cache, let every plugin register and
    /// activate the session.
    ///
    /// If a plugin fails, the plugins opened so far are closed, the session
    /// never becomes active and none of its HTTP handlers are published.
    pub async fn open(
        uid: impl Into<String>,
        cache: Arc<dyn Cache>,
        plugins: &mut [Box<dyn Plugin>],
        http_handlers: HttpHandlerRegistry,
        options: SessionOptions,
        logger: StructuredLogger,
    ) -> Result<Self, SessionError> {
        let snapshot = cache.snapshot().await?;
        let mut ssn = Session::new(uid, snapshot, cache, http_handlers, options, logger);
        ssn.state = SessionState::Open;

        for index in 0..plugins.len() {
            if let Err(source) = plugins[index].on_session_open(&mut ssn) {
                let plugin = plugins[index].name().to_string();
                ssn.logger
                    .log_plugin_failure(&ssn.uid, &plugin, &source.to_string());
                ssn.close(&mut plugins[..index]);
                return Err(SessionError::PluginOpen { plugin, source });
            }
        }

        ssn.state = SessionState::Active;
        for (path, handler) in ssn.pending_handlers.drain(..) {
            ssn.http_handlers.register(path, handler);
        }
        ssn.logger.log_session_opened(
            &ssn.uid,
            plugins.len(),
            ssn.snapshot.pod_groups.len(),
            ssn.snapshot.nodes.len(),
        );
        Ok(ssn)
    }

    /// Run every plugin's teardown and release registrations
    pub fn close(&mut self, plugins: &mut [Box<dyn Plugin>]) {
        if self.state == SessionState::Closed {
            return;
        }
        for plugin in plugins.iter_mut() {
            plugin.on_session_close(self);
        }
        self.state = SessionState::Closed;
        self.job_order_fns.clear();
        self.victim_order_fns.clear();
        self.job_filters.clear();
        self.pending_handlers.clear();
        self.logger
            .log_session_closed(&self.uid, self.opened_at.elapsed().as_secs_f64());
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn snapshot(&self) -> &ClusterSnapshot {
        &self.snapshot
    }

    pub fn cache(&self) -> Arc<dyn Cache> {
        Arc::clone(&self.cache)
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn queue_attributes(&self) -> &BTreeMap<QueueId, QueueAttributes> {
        &self.queue_attributes
    }

    fn require(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                session_id: self.uid.clone(),
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    pub fn set_queue_attributes(
        &mut self,
        queues: BTreeMap<QueueId, QueueAttributes>,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Open)?;
        self.queue_attributes = queues;
        Ok(())
    }

    pub fn add_job_order_fn(
        &mut self,
        name: impl Into<String>,
        order: impl JobComparator + 'static,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Open)?;
        self.job_order_fns.push((name.into(), Box::new(order)));
        Ok(())
    }

    pub fn add_victim_order_fn(
        &mut self,
        name: impl Into<String>,
        order: impl JobComparator + 'static,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Open)?;
        self.victim_order_fns.push((name.into(), Box::new(order)));
        Ok(())
    }

    pub fn add_job_filter(
        &mut self,
        name: impl Into<String>,
        filter: impl JobFilter + 'static,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Open)?;
        self.job_filters.push((name.into(), Box::new(filter)));
        Ok(())
    }

    pub fn add_http_handler(
        &mut self,
        path: impl Into<String>,
        handler: Arc<dyn HttpHandler>,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Open)?;
        self.pending_handlers.push((path.into(), handler));
        Ok(())
    }

    fn compose(fns: &[Named<dyn JobComparator>], l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
        fns.iter()
            .map(|(_, order)| order.compare(l, r))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// Composite pending-job order; `Greater` means `l` should be served first
    pub fn job_order(&self, l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
        Self::compose(&self.job_order_fns, l, r)
    }

    /// Composite victim order; `Greater` means `l` should be evicted first
    pub fn victim_order(&self, l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
        Self::compose(&self.victim_order_fns, l, r)
    }

    pub fn job_valid(&self, job: &PodGroupInfo) -> bool {
        self.job_filters.iter().all(|(_, filter)| filter.admit(job))
    }

    /// Sort jobs most preferred first with the given composite order.
    ///
    /// The sort is stable, so jobs that compare equal keep their input order.
    fn sort_preferred<'a>(
        &self,
        mut jobs: Vec<&'a PodGroupInfo>,
        order: impl Fn(&PodGroupInfo, &PodGroupInfo) -> Ordering,
    ) -> Result<Vec<&'a PodGroupInfo>, SessionError> {
        self.require(SessionState::Active)?;
        if let Some(empty) = jobs.iter().find(|job| job.pod_infos.is_empty()) {
            return Err(SessionError::EmptyPodGroup(empty.uid.clone()));
        }
        jobs.sort_by(|l, r| order(r, l));
        Ok(jobs)
    }

    /// Order arbitrary jobs by the pending-job order
    pub fn order_jobs<'a>(
        &self,
        jobs: Vec<&'a PodGroupInfo>,
    ) -> Result<Vec<&'a PodGroupInfo>, SessionError> {
        self.sort_preferred(jobs, |l, r| self.job_order(l, r))
    }

    /// Order arbitrary jobs by the victim order
    pub fn order_victims<'a>(
        &self,
        jobs: Vec<&'a PodGroupInfo>,
    ) -> Result<Vec<&'a PodGroupInfo>, SessionError> {
        self.sort_preferred(jobs, |l, r| self.victim_order(l, r))
    }

    /// Jobs with unbound pods that pass every filter, most deserving first
    pub fn pending_jobs_in_order(&self) -> Result<Vec<&PodGroupInfo>, SessionError> {
        let pending = self
            .snapshot
            .pod_groups
            .values()
            .filter(|job| job.has_pending_pods() && self.job_valid(job))
            .collect();
        self.order_jobs(pending)
    }

    /// Running jobs whose queue exceeds its GPU fair share, first victim first.
    ///
    /// Without computed queue attributes every running job is a candidate.
    pub fn victims_in_order(&self) -> Result<Vec<&PodGroupInfo>, SessionError> {
        let running = self
            .snapshot
            .pod_groups
            .values()
            .filter(|job| job.has_bound_pods())
            .filter(|job| {
                self.queue_attributes.is_empty()
                    || self
                        .queue_attributes
                        .get(&job.queue)
                        .map(|queue| queue.share.gpu.is_over_allocated())
                        .unwrap_or(false)
            })
            .collect();
        self.order_victims(running)
    }

    pub fn reclaim_plan(&self) -> Result<ReclaimPlan, SessionError> {
        let reclaimers = self
            .pending_jobs_in_order()?
            .into_iter()
            .map(|job| job.uid.clone())
            .collect();
        let victims = self
            .victims_in_order()?
            .into_iter()
            .map(|job| job.uid.clone())
            .collect();
        Ok(ReclaimPlan {
            session_id: self.uid.clone(),
            reclaimers,
            victims,
        })
    }
}
