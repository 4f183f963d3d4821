//! Core data models shared by the snapshot, allocator and plugins

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Unique identifier of a queue
    QueueId
);
string_id!(
    /// Unique identifier of a pod group (job)
    PodGroupId
);
string_id!(
    /// Unique identifier of a pod
    PodId
);

/// Resource dimensions tracked by the fair-share accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Gpu,
    Cpu,
    Memory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Gpu, ResourceKind::Cpu, ResourceKind::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Gpu => "gpu",
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quantity per resource kind.
///
/// CPU is expressed in millicores, memory in bytes and GPUs in (possibly
/// fractional) devices. Used both for pod requests and node capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub milli_cpu: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub gpus: f64,
}

impl Resources {
    pub fn new(milli_cpu: f64, memory: f64, gpus: f64) -> Self {
        Self {
            milli_cpu,
            memory,
            gpus,
        }
    }

    /// Requirements that only ask for GPUs
    pub fn with_gpus(gpus: f64) -> Self {
        Self {
            gpus,
            ..Self::default()
        }
    }

    pub fn gpus(&self) -> f64 {
        self.gpus
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Gpu => self.gpus,
            ResourceKind::Cpu => self.milli_cpu,
            ResourceKind::Memory => self.memory,
        }
    }

    /// Returns the first resource kind holding a negative quantity
    pub fn negative_kind(&self) -> Option<ResourceKind> {
        ResourceKind::ALL.into_iter().find(|kind| self.get(*kind) < 0.0)
    }

    pub fn add(&mut self, other: &Resources) {
        self.milli_cpu += other.milli_cpu;
        self.memory += other.memory;
        self.gpus += other.gpus;
    }
}
