//! `schedctl order`: fair shares and reclaim order computed locally

use anyhow::{Context, Result};
use colored::Colorize;
use scheduler_lib::framework::{Cache, HttpHandlerRegistry, PluginOption, Session, SessionOptions};
use scheduler_lib::plugins::default_registry;
use scheduler_lib::proportion::STARVATION_FACTOR_ARG;
use scheduler_lib::snapshot::PodGroupInfo;
use scheduler_lib::{
    ClusterSnapshot, ClusterState, PodGroupId, QueueAttributes, ReclaimPlan, SchedulerCache,
    StructuredLogger,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{color_ratio, format_gpus, print_json, print_section, OutputFormat};

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderOptions {
    pub full_hierarchy_fairness: bool,
    pub restrict_node_scheduling: bool,
    pub starvation_factor: Option<f64>,
}

/// Everything one offline session produced
#[derive(Debug, Serialize)]
pub struct OrderResult {
    pub queues: Vec<QueueAttributes>,
    pub plan: ReclaimPlan,
}

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "Queue")]
    name: String,
    #[tabled(rename = "GPU Deserved")]
    deserved: String,
    #[tabled(rename = "GPU Fair Share")]
    fair_share: String,
    #[tabled(rename = "GPU Allocated")]
    allocated: String,
    #[tabled(rename = "GPU Request")]
    request: String,
    #[tabled(rename = "Ratio")]
    ratio: String,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Pod Group")]
    name: String,
    #[tabled(rename = "Queue")]
    queue: String,
    #[tabled(rename = "GPUs")]
    gpus: String,
}

/// Run the priority, proportion and gang plugins over `state` and collect the plan
pub async fn compute_order(state: ClusterState, options: OrderOptions) -> Result<OrderResult> {
    let cache: Arc<dyn Cache> = Arc::new(SchedulerCache::new(state));

    let mut proportion = PluginOption::new("proportion");
    if let Some(factor) = options.starvation_factor {
        proportion = proportion.with_argument(STARVATION_FACTOR_ARG, factor.to_string());
    }
    let mut plugins = default_registry().build(&[
        PluginOption::new("priority"),
        proportion,
        PluginOption::new("gang"),
    ])?;

    let mut ssn = Session::open(
        "schedctl",
        cache,
        &mut plugins,
        HttpHandlerRegistry::new(),
        SessionOptions {
            full_hierarchy_fairness: options.full_hierarchy_fairness,
            restrict_node_scheduling: options.restrict_node_scheduling,
        },
        StructuredLogger::new("schedctl"),
    )
    .await
    .context("Failed to open scheduling session")?;

    let plan = ssn.reclaim_plan();
    let queues = ssn.queue_attributes().values().cloned().collect();
    ssn.close(&mut plugins);

    Ok(OrderResult {
        queues,
        plan: plan.context("Failed to order jobs")?,
    })
}

fn lookup<'a>(snapshot: &'a ClusterSnapshot, ids: &[PodGroupId]) -> Vec<&'a PodGroupInfo> {
    ids.iter()
        .filter_map(|id| snapshot.pod_groups.get(id))
        .collect()
}

fn job_rows(jobs: Vec<&PodGroupInfo>, gpus: fn(&PodGroupInfo) -> f64) -> Vec<JobRow> {
    jobs.into_iter()
        .enumerate()
        .map(|(i, job)| JobRow {
            rank: i + 1,
            name: job.uid.to_string(),
            queue: job.queue.to_string(),
            gpus: format_gpus(gpus(job)),
        })
        .collect()
}

pub async fn show_order(file: &Path, options: OrderOptions, format: OutputFormat) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let state = ClusterState::from_json(&data)
        .with_context(|| format!("Failed to parse cluster state {}", file.display()))?;

    let snapshot = ClusterSnapshot::build(&state)
        .with_context(|| format!("Invalid cluster state {}", file.display()))?;
    let result = compute_order(state, options).await?;

    if let OutputFormat::Json = format {
        return print_json(&result);
    }

    let queue_rows = result
        .queues
        .iter()
        .map(|q| QueueRow {
            name: q.uid.to_string(),
            deserved: format_gpus(q.share.gpu.deserved),
            fair_share: format_gpus(q.share.gpu.fair_share),
            allocated: format_gpus(q.share.gpu.allocated),
            request: format_gpus(q.share.gpu.request),
            ratio: color_ratio(q.share.gpu.allocation_ratio()),
        })
        .collect();
    print_section("Queues", queue_rows);

    print_section(
        "Reclaimers (most deserving first)",
        job_rows(lookup(&snapshot, &result.plan.reclaimers), |j| j.requested().gpus),
    );
    print_section(
        "Victims (first to evict first)",
        job_rows(lookup(&snapshot, &result.plan.victims), |j| j.allocated().gpus),
    );
    if result.plan.victims.is_empty() {
        println!("{}", "No queue is above its fair share".dimmed());
    }

    Ok(())
}
