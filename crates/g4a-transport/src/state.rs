//! Worker lifecycle state

use serde::Serialize;
use std::fmt;

/// Lifecycle state of the supervised worker
///
/// One cycle runs `Stopped → Starting → Running → Stopping → Stopped`.
/// A failed spawn goes straight from `Starting` back to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// No worker process exists
    #[default]
    Stopped,
    /// Binary checked, process being spawned
    Starting,
    /// Process spawned and its pipes attached
    Running,
    /// Termination requested, waiting for exit
    Stopping,
}

impl WorkerState {
    /// Whether moving from `self` to `next` is a legal lifecycle step
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Whether a worker process is attached
    pub fn is_running(self) -> bool {
        self == WorkerState::Running
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Stopped => "stopped",
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
