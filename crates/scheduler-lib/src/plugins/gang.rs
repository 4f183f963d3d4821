//! Gang admission: a pod group is only considered once all of its minimum
//! members exist

use crate::error::PluginError;
use crate::framework::{Plugin, PluginArguments, Session};
use crate::snapshot::PodGroupInfo;

pub const PLUGIN_NAME: &str = "gang";

#[derive(Debug, Default)]
pub struct GangPlugin;

impl GangPlugin {
    pub fn build(_arguments: &PluginArguments) -> Box<dyn Plugin> {
        Box::new(GangPlugin)
    }
}

/// True when the group has at least `min_member` pods
pub fn gang_ready(job: &PodGroupInfo) -> bool {
    job.pod_infos.len() >= job.min_member as usize
}

impl Plugin for GangPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn on_session_open(&mut self, ssn: &mut Session) -> Result<(), PluginError> {
        ssn.add_job_filter("min-member", gang_ready)?;
        Ok(())
    }

    fn on_session_close(&mut self, _ssn: &mut Session) {}
}
