//! Scheduling session and plugin framework
//!
//! A [`Session`] hosts one scheduling cycle. Plugins are instantiated from a
//! [`PluginRegistry`] for every cycle, register comparators, filters and
//! debug handlers while the session is open, and tear down when it closes.

mod cache;
mod http;
mod session;

pub use cache::{Cache, SchedulerCache};
pub use http::{debug_router, HandlerResponse, HttpHandler, HttpHandlerRegistry};
pub use session::{ReclaimPlan, Session, SessionOptions, SessionState};

use crate::error::{PluginError, SessionError};
use crate::snapshot::PodGroupInfo;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Plugin-specific options; unrecognized keys are ignored by plugins
pub type PluginArguments = HashMap<String, String>;

/// Look up a plugin argument, ignoring key case
pub fn plugin_argument<'a>(arguments: &'a PluginArguments, key: &str) -> Option<&'a String> {
    arguments
        .get(key)
        .or_else(|| {
            arguments
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
}

/// Builds a fresh plugin instance for one session
pub type PluginBuilder = fn(&PluginArguments) -> Box<dyn Plugin>;

/// Trait implemented by every scheduling plugin
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Register comparators, filters and handlers against the session.
    ///
    /// An error keeps the session from becoming active.
    fn on_session_open(&mut self, ssn: &mut Session) -> Result<(), PluginError>;

    /// Release anything tied to the session
    fn on_session_close(&mut self, ssn: &mut Session);
}

/// Three-way comparison of two jobs; `Greater` means `l` is preferred
pub trait JobComparator: Send + Sync {
    fn compare(&self, l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering;
}

impl<F> JobComparator for F
where
    F: Fn(&PodGroupInfo, &PodGroupInfo) -> Ordering + Send + Sync,
{
    fn compare(&self, l: &PodGroupInfo, r: &PodGroupInfo) -> Ordering {
        self(l, r)
    }
}

/// Predicate deciding whether a job may be considered this cycle
pub trait JobFilter: Send + Sync {
    fn admit(&self, job: &PodGroupInfo) -> bool;
}

impl<F> JobFilter for F
where
    F: Fn(&PodGroupInfo) -> bool + Send + Sync,
{
    fn admit(&self, job: &PodGroupInfo) -> bool {
        self(job)
    }
}

/// A plugin enabled in configuration, with its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginOption {
    pub name: String,
    #[serde(default)]
    pub arguments: PluginArguments,
}

impl PluginOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: PluginArguments::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// Ordered set of known plugin builders
#[derive(Clone, Default)]
pub struct PluginRegistry {
    builders: Vec<(String, PluginBuilder)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder, replacing any previous builder of the same name
    pub fn register(&mut self, name: impl Into<String>, builder: PluginBuilder) {
        let name = name.into();
        match self.builders.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = builder,
            None => self.builders.push((name, builder)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.builders.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Instantiate the configured plugins, in configuration order
    pub fn build(&self, options: &[PluginOption]) -> Result<Vec<Box<dyn Plugin>>, SessionError> {
        options
            .iter()
            .map(|option| {
                self.builders
                    .iter()
                    .find(|(name, _)| *name == option.name)
                    .map(|(_, builder)| builder(&option.arguments))
                    .ok_or_else(|| SessionError::UnknownPlugin(option.name.clone()))
            })
            .collect()
    }
}
