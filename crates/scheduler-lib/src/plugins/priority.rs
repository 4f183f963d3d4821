//! Priority ordering: higher priority pod groups are served first and
//! evicted last

use crate::error::PluginError;
use crate::framework::{Plugin, PluginArguments, Session};
use crate::snapshot::PodGroupInfo;
use std::cmp::Ordering;

pub const PLUGIN_NAME: &str = "priority";

#[derive(Debug, Default)]
pub struct PriorityPlugin;

impl PriorityPlugin {
    pub fn build(_arguments: &PluginArguments) -> Box<dyn Plugin> {
        Box::new(PriorityPlugin)
    }
}

/// `Greater` when `l` has the higher priority
pub fn higher_priority_first(l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
    l.priority.cmp(&r.priority)
}

/// `Greater` when `l` has the lower priority
pub fn lower_priority_first(l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
    r.priority.cmp(&l.priority)
}

impl Plugin for PriorityPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn on_session_open(&mut self, ssn: &mut Session) -> Result<(), PluginError> {
        ssn.add_job_order_fn("priority", higher_priority_first)?;
        ssn.add_victim_order_fn("priority", lower_priority_first)?;
        Ok(())
    }

    fn on_session_close(&mut self, _ssn: &mut Session) {}
}
