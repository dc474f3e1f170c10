//! Collection events produced by timers and consumed by the metrics collector.

use std::fmt;

/// Metric group a collection event asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricGroup {
    Cpu,
    Disk,
    Network,
    Mem,
    Process,
    All,
    /// Any name not recognised above, kept for logging
    Unknown(String),
}

impl MetricGroup {
    pub fn name(&self) -> &str {
        match self {
            MetricGroup::Cpu => "cpu",
            MetricGroup::Disk => "disk",
            MetricGroup::Network => "network",
            MetricGroup::Mem => "mem",
            MetricGroup::Process => "process",
            MetricGroup::All => "all",
            MetricGroup::Unknown(name) => name,
        }
    }
}

impl From<&str> for MetricGroup {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "cpu" => MetricGroup::Cpu,
            "disk" => MetricGroup::Disk,
            "network" => MetricGroup::Network,
            "mem" | "memory" => MetricGroup::Mem,
            "process" => MetricGroup::Process,
            "all" => MetricGroup::All,
            _ => MetricGroup::Unknown(name.to_string()),
        }
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scope of a collection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum EventKind {
    #[display("host-level")]
    HostLevel,
    #[display("process-level")]
    ProcessLevel,
}

/// A request to sample one metric group now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEvent {
    pub kind: EventKind,
    pub group: MetricGroup,
}

impl CollectionEvent {
    pub fn host(group: MetricGroup) -> Self {
        Self {
            kind: EventKind::HostLevel,
            group,
        }
    }

    pub fn process(group: MetricGroup) -> Self {
        Self {
            kind: EventKind::ProcessLevel,
            group,
        }
    }
}
