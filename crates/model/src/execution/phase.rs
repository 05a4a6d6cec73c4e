use serde::Serialize;
use std::fmt;

/// Lifecycle of a pipeline run.
///
/// `Idle -> Running -> Draining -> Complete`, with `Failed` reachable from
/// every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelinePhase {
    Idle,
    Running,
    Draining,
    Complete,
    Failed,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "Idle",
            PipelinePhase::Running => "Running",
            PipelinePhase::Draining => "Draining",
            PipelinePhase::Complete => "Complete",
            PipelinePhase::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Complete | PipelinePhase::Failed)
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
