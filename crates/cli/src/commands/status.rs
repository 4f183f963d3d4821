//! `schedctl status`: scheduler health and the last cycle's plan

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::client::ApiClient;
use crate::output::{color_status, print_info, print_json, print_success, print_warning, OutputFormat};

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let last_cycle = client.last_cycle().await?;

    if let OutputFormat::Json = format {
        return print_json(&json!({ "health": health, "last_cycle": last_cycle }));
    }

    println!("{}", "Scheduler Status".bold());
    println!("{}", "=".repeat(50));
    println!(
        "Status:                 {}",
        color_status(&format!("{:?}", health.status).to_lowercase())
    );
    for (name, component) in &health.components {
        println!(
            "  {:<22}{} ({})",
            name,
            color_status(&format!("{:?}", component.status).to_lowercase()),
            format_timestamp(component.last_check_timestamp)
        );
        if let Some(message) = &component.message {
            println!("  {:<22}{}", "", message.dimmed());
        }
    }
    println!();

    match last_cycle {
        Some(report) => {
            print_success(&format!(
                "Cycle {} ({}) took {:.1}ms",
                report.cycle,
                report.plan.session_id,
                report.duration_secs * 1000.0
            ));
            println!("Reclaimers:             {}", report.plan.reclaimers.len());
            println!("Victims:                {}", report.plan.victims.len());
            if let Some(first) = report.plan.reclaimers.first() {
                println!("Next reclaimer:         {}", first.as_str().cyan());
            }
            if let Some(first) = report.plan.victims.first() {
                println!("Next victim:            {}", first.as_str().cyan());
            }
        }
        None => {
            print_warning("No scheduling cycle has completed yet");
            print_info("Check the scheduler logs for cycle_failed events");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
    }
}
