//! Reclaim scheduler CLI
//!
//! Inspects a running scheduler through its debug endpoints and computes
//! fair shares and reclaim order offline from a cluster-state file.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{order, snapshot, status};
use std::path::PathBuf;

/// Reclaim scheduler CLI
#[derive(Parser)]
#[command(name = "schedctl")]
#[command(author, version, about = "CLI for the reclaim scheduler", long_about = None)]
pub struct Cli {
    /// Scheduler HTTP endpoint (can also be set via SCHEDCTL_API_URL env var)
    #[arg(long, env = "SCHEDCTL_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the scheduler's current cluster snapshot
    Snapshot {
        /// Only show pod groups of this queue
        #[arg(long, short)]
        queue: Option<String>,
    },

    /// Compute fair shares and reclaim order from a cluster-state file
    Order {
        /// Cluster state JSON (same format as the scheduler's cache seed)
        #[arg(long)]
        file: PathBuf,

        /// Divide capacity across leaf queues instead of level by level
        #[arg(long)]
        flat: bool,

        /// Count GPU capacity only on GPU worker nodes
        #[arg(long)]
        restrict_node_scheduling: bool,

        /// Multiplier for GPUs held by queues without fair share
        #[arg(long)]
        starvation_factor: Option<f64>,
    },

    /// Show scheduler health and the last scheduling cycle
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot { queue } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            snapshot::show_snapshot(&client, queue.as_deref(), cli.format).await?;
        }
        Commands::Order {
            file,
            flat,
            restrict_node_scheduling,
            starvation_factor,
        } => {
            let options = order::OrderOptions {
                full_hierarchy_fairness: !flat,
                restrict_node_scheduling,
                starvation_factor,
            };
            order::show_order(&file, options, cli.format).await?;
        }
        Commands::Status => {
            let client = client::ApiClient::new(&cli.api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
