//! Worker transport trait
//!
//! Abstracts the supervised worker so the bridge actor can drive either the
//! real subprocess or an in-memory double.

use crate::error::Result;
use crate::exchange::ReadOptions;
use crate::state::WorkerState;
use crate::subprocess::WorkerSupervisor;
use async_trait::async_trait;
use std::time::Duration;

/// A line-oriented worker with a start/stop lifecycle
#[async_trait]
pub trait WorkerTransport: Send {
    /// Start the worker if it is not already running
    async fn start(&mut self) -> Result<()>;

    /// Stop the worker, force killing it after `force_kill_timeout`
    async fn stop(&mut self, force_kill_timeout: Duration) -> Result<()>;

    /// Write one line to the worker
    async fn send(&mut self, message: &str) -> Result<()>;

    /// Read the next complete response
    async fn read_response(&mut self, options: &ReadOptions) -> Result<String>;

    /// Current lifecycle state
    fn state(&mut self) -> WorkerState;

    /// OS process id, if a process is attached
    fn pid(&self) -> Option<u32>;

    /// Send `message` and read its response
    async fn exchange(&mut self, message: &str, options: &ReadOptions) -> Result<String> {
        self.send(message).await?;
        self.read_response(options).await
    }
}

#[async_trait]
impl WorkerTransport for WorkerSupervisor {
    async fn start(&mut self) -> Result<()> {
        WorkerSupervisor::start(self).await
    }

    async fn stop(&mut self, force_kill_timeout: Duration) -> Result<()> {
        WorkerSupervisor::stop(self, force_kill_timeout).await
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        WorkerSupervisor::send(self, message).await
    }

    async fn read_response(&mut self, options: &ReadOptions) -> Result<String> {
        WorkerSupervisor::read_response(self, options).await
    }

    fn state(&mut self) -> WorkerState {
        WorkerSupervisor::state(self)
    }

    fn pid(&self) -> Option<u32> {
        WorkerSupervisor::pid(self)
    }
}
