//! Built-in scheduling plugins

pub mod gang;
pub mod priority;
pub mod snapshot;

use crate::framework::PluginRegistry;
use crate::proportion::{self, ProportionPlugin};

pub use gang::GangPlugin;
pub use priority::PriorityPlugin;
pub use snapshot::{SnapshotHandler, SnapshotPlugin, SNAPSHOT_PATH};

/// Registry holding every built-in plugin
pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(priority::PLUGIN_NAME, PriorityPlugin::build);
    registry.register(proportion::PLUGIN_NAME, ProportionPlugin::build);
    registry.register(gang::PLUGIN_NAME, GangPlugin::build);
    registry.register(snapshot::PLUGIN_NAME, SnapshotPlugin::build);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::PluginOption;

    #[test]
    fn test_default_registry_knows_builtin_plugins() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["priority", "proportion", "gang", "snapshot"]);

        let plugins = registry
            .build(&[PluginOption::new("snapshot"), PluginOption::new("gang")])
            .unwrap();
        let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["snapshot", "gang"]);
    }
}
