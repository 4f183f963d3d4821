//! `schedctl snapshot`: the scheduler's current view of the cluster

use anyhow::Result;
use scheduler_lib::ClusterSnapshot;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    format_bytes, format_cpu, format_gpus, format_limit, print_json, print_section, OutputFormat,
};

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "Queue")]
    name: String,
    #[tabled(rename = "Parent")]
    parent: String,
    #[tabled(rename = "GPU Deserved")]
    deserved: String,
    #[tabled(rename = "GPU Limit")]
    limit: String,
    #[tabled(rename = "Weight")]
    weight: String,
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "GPUs")]
    gpus: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Pods")]
    pods: usize,
}

#[derive(Tabled)]
struct PodGroupRow {
    #[tabled(rename = "Pod Group")]
    name: String,
    #[tabled(rename = "Queue")]
    queue: String,
    #[tabled(rename = "Priority")]
    priority: i32,
    #[tabled(rename = "Min Member")]
    min_member: u32,
    #[tabled(rename = "Pods")]
    pods: usize,
    #[tabled(rename = "Bound")]
    bound: usize,
    #[tabled(rename = "GPUs")]
    gpus: String,
}

/// Drop pod groups outside `queue` and their pods
fn filter_queue(snapshot: &mut ClusterSnapshot, queue: &str) {
    snapshot.pod_groups.retain(|_, group| group.queue.as_str() == queue);
    let groups = &snapshot.pod_groups;
    snapshot.pods.retain(|_, pod| groups.contains_key(&pod.job));
}

fn queue_rows(snapshot: &ClusterSnapshot) -> Vec<QueueRow> {
    snapshot
        .queues
        .values()
        .map(|q| QueueRow {
            name: q.uid.to_string(),
            parent: q
                .parent
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
            deserved: format_gpus(q.gpu.deserved),
            limit: format_limit(q.gpu.limit),
            weight: format_gpus(q.gpu.over_quota_weight),
        })
        .collect()
}

fn node_rows(snapshot: &ClusterSnapshot) -> Vec<NodeRow> {
    snapshot
        .nodes
        .values()
        .map(|n| {
            let used = n.used();
            NodeRow {
                name: n.name.clone(),
                gpus: format!(
                    "{}/{}",
                    format_gpus(used.gpus),
                    format_gpus(n.allocatable.gpus)
                ),
                cpu: format_cpu(n.allocatable.milli_cpu),
                memory: format_bytes(n.allocatable.memory),
                pods: n.pod_infos.len(),
            }
        })
        .collect()
}

fn pod_group_rows(snapshot: &ClusterSnapshot) -> Vec<PodGroupRow> {
    snapshot
        .pod_groups
        .values()
        .map(|g| PodGroupRow {
            name: g.uid.to_string(),
            queue: g.queue.to_string(),
            priority: g.priority,
            min_member: g.min_member,
            pods: g.pod_infos.len(),
            bound: g.bound_pods().count(),
            gpus: format_gpus(g.requested().gpus),
        })
        .collect()
}

pub async fn show_snapshot(
    client: &ApiClient,
    queue: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let mut snapshot = client.snapshot().await?;
    if let Some(queue) = queue {
        filter_queue(&mut snapshot, queue);
    }

    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => {
            print_section("Queues", queue_rows(&snapshot));
            print_section("Nodes", node_rows(&snapshot));
            print_section("Pod Groups", pod_group_rows(&snapshot));
            let ungrouped = snapshot.pods.values().filter(|p| p.job.is_empty()).count();
            if ungrouped > 0 {
                println!("{} pods without a pod group", ungrouped);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_lib::snapshot::{ClusterState, NodeInfo, PodGroupInfo, PodInfo, QueueInfo};
    use scheduler_lib::Resources;

    fn snapshot() -> ClusterSnapshot {
        ClusterSnapshot::build(&ClusterState {
            queues: vec![QueueInfo::new("a"), QueueInfo::new("b")],
            nodes: vec![NodeInfo::new("n1", Resources::new(8000.0, 0.0, 4.0))],
            pod_groups: vec![PodGroupInfo::new("ja", "a"), PodGroupInfo::new("jb", "b")],
            pods: vec![
                PodInfo::new("pa", "ja", Resources::with_gpus(1.0)).bound_to("n1"),
                PodInfo::new("pb", "jb", Resources::with_gpus(2.0)),
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_rows() {
        let snapshot = snapshot();

        let nodes = node_rows(&snapshot);
        assert_eq!(nodes[0].gpus, "1/4");
        assert_eq!(nodes[0].cpu, "8.0");
        assert_eq!(nodes[0].pods, 1);

        let groups = pod_group_rows(&snapshot);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].bound, 1);
        assert_eq!(groups[1].gpus, "2");

        assert_eq!(queue_rows(&snapshot)[0].parent, "-");
    }

    #[test]
    fn test_filter_queue() {
        let mut snapshot = snapshot();
        filter_queue(&mut snapshot, "b");
        let names: Vec<String> = pod_group_rows(&snapshot).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["jb".to_string()]);
        let pods: Vec<String> = snapshot.pods.keys().map(ToString::to_string).collect();
        assert_eq!(pods, vec!["pb".to_string()]);
    }
}
