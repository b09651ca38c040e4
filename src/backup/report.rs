use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::storage::FolderReplication;

/// Where a run's dump got to. Failures are terminal for replication, but
/// every run still ends in `Cleaned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStage {
    NotStarted,
    ConnectivityChecked,
    DumpRunning,
    DumpSucceeded,
    DumpFailed,
    Finalized,
    FinalizeFailed,
    Cleaned,
}

impl fmt::Display for DumpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DumpStage::NotStarted => "not started",
            DumpStage::ConnectivityChecked => "connectivity checked",
            DumpStage::DumpRunning => "dump running",
            DumpStage::DumpSucceeded => "dump succeeded",
            DumpStage::DumpFailed => "dump failed",
            DumpStage::Finalized => "finalized",
            DumpStage::FinalizeFailed => "finalize failed",
            DumpStage::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// Records the stages a run passes through, in order.
#[derive(Debug, Clone)]
pub struct StageTrail {
    stages: Vec<DumpStage>,
}

impl StageTrail {
    pub fn new() -> Self {
        Self {
            stages: vec![DumpStage::NotStarted],
        }
    }

    pub fn advance(&mut self, next: DumpStage) {
        debug!("Pipeline stage: {} -> {}", self.current(), next);
        self.stages.push(next);
    }

    pub fn current(&self) -> DumpStage {
        self.stages.last().copied().unwrap_or(DumpStage::NotStarted)
    }

    #[cfg(test)]
    pub fn reached(&self, stage: DumpStage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn stages(&self) -> &[DumpStage] {
        &self.stages
    }
}

impl fmt::Display for StageTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.stages().iter().map(|s| s.to_string()).collect();
        f.write_str(&names.join(" -> "))
    }
}

impl Default for StageTrail {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one pipeline run, handed to the notifiers.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub dump_succeeded: bool,
    pub size: Option<String>,
    pub path: Option<PathBuf>,
    pub replicated: bool,
    pub elapsed: Duration,
    pub replication: FolderReplication,
    pub cleaned: bool,
    pub trail: StageTrail,
}

impl RunReport {
    /// True only when the dump succeeded and replication ran to completion.
    pub fn succeeded(&self) -> bool {
        self.dump_succeeded && self.replicated
    }
}
