//! Scheduler configuration

use anyhow::{Context, Result};
use scheduler_lib::{PluginOption, SchedulerSettings, SessionOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "SCHEDULER_CONFIG";

const ENV_PREFIX: &str = "SCHEDULER";

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_name")]
    pub scheduler_name: String,

    /// Port serving health, metrics and debug handlers
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_schedule_period")]
    pub schedule_period_secs: u64,

    /// Divide capacity level by level instead of across leaf queues
    #[serde(default = "default_true")]
    pub full_hierarchy_fairness: bool,

    /// Count GPU capacity only on GPU worker nodes
    #[serde(default)]
    pub restrict_node_scheduling: bool,

    /// Cluster state JSON seeding the cache
    #[serde(default)]
    pub cluster_state_path: Option<PathBuf>,

    #[serde(default = "default_plugins")]
    pub plugins: Vec<PluginOption>,
}

fn default_scheduler_name() -> String {
    "reclaim-scheduler".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_schedule_period() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_plugins() -> Vec<PluginOption> {
    SchedulerSettings::default().plugins
}

impl SchedulerConfig {
    /// Load from the file named by `SCHEDULER_CONFIG`, if set, overridden by
    /// `SCHEDULER_*` environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;

        config
            .try_deserialize()
            .context("Invalid scheduler configuration")
    }

    pub fn settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            schedule_period: Duration::from_secs(self.schedule_period_secs.max(1)),
            session_options: SessionOptions {
                full_hierarchy_fairness: self.full_hierarchy_fairness,
                restrict_node_scheduling: self.restrict_node_scheduling,
            },
            plugins: self.plugins.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::load_from(None).unwrap();
        assert_eq!(config.scheduler_name, "reclaim-scheduler");
        assert_eq!(config.api_port, 8080);
        assert!(config.full_hierarchy_fairness);
        assert!(!config.restrict_node_scheduling);

        let settings = config.settings();
        assert_eq!(settings.schedule_period, Duration::from_secs(1));
        let names: Vec<&str> = settings.plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["priority", "proportion", "gang", "snapshot"]);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            ".toml",
            r#"
api_port = 9091
schedule_period_secs = 5
full_hierarchy_fairness = false
restrict_node_scheduling = true
cluster_state_path = "/var/lib/scheduler/state.json"

[[plugins]]
name = "proportion"
arguments = { starvationFactor = "50" }

[[plugins]]
name = "snapshot"
"#,
        );

        let config = SchedulerConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.api_port, 9091);
        assert_eq!(
            config.cluster_state_path,
            Some(PathBuf::from("/var/lib/scheduler/state.json"))
        );

        let settings = config.settings();
        assert_eq!(settings.schedule_period, Duration::from_secs(5));
        assert!(!settings.session_options.full_hierarchy_fairness);
        assert!(settings.session_options.restrict_node_scheduling);
        assert_eq!(settings.plugins.len(), 2);
        assert_eq!(settings.plugins[0].name, "proportion");
        assert_eq!(
            scheduler_lib::framework::plugin_argument(
                &settings.plugins[0].arguments,
                "starvationFactor"
            )
            .map(String::as_str),
            Some("50")
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let file = write_config(".toml", "api_port = \"not a port\"");
        assert!(SchedulerConfig::load_from(Some(file.path())).is_err());
    }
}
