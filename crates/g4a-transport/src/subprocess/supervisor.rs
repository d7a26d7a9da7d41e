//! Worker lifecycle supervision
//!
//! [`WorkerSupervisor`] owns at most one [`WorkerProcess`] and moves it through
//! the [`WorkerState`] cycle. Exit of the worker is detected lazily: every state
//! query and every exchange polls the child first and releases it if it died.

use super::process::{WorkerConfig, WorkerProcess, ensure_executable};
use crate::error::{Result, TransportError};
use crate::state::WorkerState;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time allowed between the interrupt signal and a forced kill
pub const DEFAULT_FORCE_KILL_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Owner of the worker process
pub struct WorkerSupervisor {
    config: WorkerConfig,
    state: WorkerState,
    worker: Option<WorkerProcess>,
}

impl WorkerSupervisor {
    /// Create a supervisor; nothing is spawned until [`start`](Self::start)
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            state: WorkerState::Stopped,
            worker: None,
        }
    }

    /// Spawn configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Current lifecycle state, after checking whether the worker exited
    pub fn state(&mut self) -> WorkerState {
        self.reap_exited();
        self.state
    }

    /// OS process id of the running worker
    pub fn pid(&self) -> Option<u32> {
        self.worker.as_ref().and_then(WorkerProcess::pid)
    }

    /// Start the worker.
    ///
    /// Does nothing if a worker is already running.
    ///
    /// # Errors
    ///
    /// - [`TransportError::BinaryNotExecutable`] if the binary is missing or not
    ///   executable; nothing is spawned.
    /// - [`TransportError::ProcessSpawnFailed`] if the OS refuses to start it.
    pub async fn start(&mut self) -> Result<()> {
        self.reap_exited();
        if self.worker.is_some() {
            debug!(pid = ?self.pid(), "Worker already running, start is a no-op");
            return Ok(());
        }

        let path = self.config.binary_path.clone();
        debug!(path = %path.display(), "Starting worker process");

        ensure_executable(&path)
            .await
            .map_err(|source| TransportError::BinaryNotExecutable {
                path: path.clone(),
                source,
            })?;
        debug!("Binary exec check succeeded");

        self.transition(WorkerState::Starting);
        match WorkerProcess::spawn(&self.config).await {
            Ok(worker) => {
                info!(pid = ?worker.pid(), path = %path.display(), "Worker process spawned");
                self.worker = Some(worker);
                self.transition(WorkerState::Running);
                Ok(())
            }
            Err(err) => {
                warn!("{}", err);
                self.transition(WorkerState::Stopped);
                Err(err)
            }
        }
    }

    /// Stop the worker: interrupt, then kill after `force_kill_timeout`.
    ///
    /// Resolves once the process has exited. Does nothing if no worker runs.
    pub async fn stop(&mut self, force_kill_timeout: Duration) -> Result<()> {
        self.reap_exited();
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let pid = worker.pid();
        self.transition(WorkerState::Stopping);
        debug!(?pid, "Stopping worker process");

        match worker.terminate(force_kill_timeout).await {
            Some(status) => info!(?pid, %status, "Worker process closed"),
            None => warn!(?pid, "Worker process closed with unknown status"),
        }
        self.transition(WorkerState::Stopped);
        Ok(())
    }

    /// The running worker, or [`TransportError::WorkerNotRunning`]
    pub(crate) fn running_worker(&mut self) -> Result<&mut WorkerProcess> {
        self.reap_exited();
        self.worker.as_mut().ok_or(TransportError::WorkerNotRunning)
    }

    fn reap_exited(&mut self) {
        let Some(worker) = self.worker.as_mut() else {
            return;
        };

        match worker.try_exit_status() {
            Ok(None) => {}
            Ok(Some(status)) => {
                warn!(pid = ?worker.pid(), %status, "Worker process exited");
                self.worker = None;
                self.transition(WorkerState::Stopping);
                self.transition(WorkerState::Stopped);
            }
            Err(err) => {
                warn!(pid = ?worker.pid(), "Polling worker exit status failed: {}", err);
            }
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal worker transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "Worker state change");
        self.state = next;
    }
}
