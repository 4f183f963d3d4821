//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a titled table, or a placeholder when there are no rows
pub fn print_section<T: Tabled>(title: &str, rows: Vec<T>) {
    println!("{}", title.bold());
    if rows.is_empty() {
        println!("{}\n", "  none".dimmed());
        return;
    }
    println!("{}\n", Table::new(rows).with(Style::rounded()));
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.2}Gi", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes / KB)
    } else {
        format!("{}B", bytes)
    }
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: f64) -> String {
    if millicores >= 1000.0 {
        format!("{:.1}", millicores / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Trim trailing zeros from fractional GPU counts
pub fn format_gpus(gpus: f64) -> String {
    if gpus.fract() == 0.0 {
        format!("{}", gpus as i64)
    } else {
        format!("{:.2}", gpus)
    }
}

pub fn format_limit(limit: Option<f64>) -> String {
    limit.map(format_gpus).unwrap_or_else(|| "-".to_string())
}

/// Allocation over fair share; a queue with no fair share shows "-"
pub fn color_ratio(ratio: Option<f64>) -> String {
    match ratio {
        None => "-".to_string(),
        Some(r) if r > 1.0 => format!("{:.2}", r).red().to_string(),
        Some(r) if r >= 0.9 => format!("{:.2}", r).yellow().to_string(),
        Some(r) => format!("{:.2}", r).green().to_string(),
    }
}

pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" => status.red().to_string(),
        _ => status.to_string(),
    }
}
