//! Testing utilities
//!
//! Provides an in-memory worker for exercising [`WorkerBridge`](crate::WorkerBridge)
//! and [`ChatService`](crate::ChatService) without a GPT4All binary.

use async_trait::async_trait;
use g4a_transport::{ReadOptions, TransportError, WorkerState, WorkerTransport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

static NEXT_MOCK_PID: AtomicU32 = AtomicU32::new(10_000);

/// Configuration for mock worker behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Reply with the last line sent when no response is queued
    pub echo: bool,

    /// Delay before each read produces its response
    pub response_delay: Option<Duration>,

    /// Fail every start with a spawn error
    pub fail_start: bool,
}

/// A call observed by the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `send` with the line written
    Send(String),
    /// `read_response`
    Read,
}

#[derive(Debug, Default)]
struct MockState {
    state: WorkerState,
    pid: Option<u32>,
    responses: VecDeque<String>,
    last_sent: Option<String>,
    last_stop_timeout: Option<Duration>,
    calls: Vec<MockCall>,
}

/// Scripted stand-in for the worker process
///
/// Clones share state, so a test can keep one clone for inspection while the
/// bridge owns another.
#[derive(Debug, Clone, Default)]
pub struct MockWorker {
    inner: Arc<Mutex<MockState>>,
    config: MockConfig,
}

impl MockWorker {
    /// Create a mock that answers only from its response queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with custom behavior
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            inner: Arc::default(),
            config,
        }
    }

    /// Queue a response for a later read
    pub fn enqueue_response(&self, response: impl Into<String>) {
        self.lock().responses.push_back(response.into());
    }

    /// Every call seen so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Force-kill timeout passed to the most recent `stop`
    pub fn last_stop_timeout(&self) -> Option<Duration> {
        self.lock().last_stop_timeout
    }

    /// Lines written with `send`, in order
    pub fn sent_lines(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Send(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current state without going through the transport trait
    pub fn state_snapshot(&self) -> WorkerState {
        self.lock().state
    }

    /// Pid of the simulated process
    pub fn pid(&self) -> Option<u32> {
        self.lock().pid
    }

    /// Simulate the worker process dying on its own
    pub fn crash(&self) {
        let mut state = self.lock();
        state.state = WorkerState::Stopped;
        state.pid = None;
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_running(&self) -> g4a_transport::Result<()> {
        if self.lock().state.is_running() {
            Ok(())
        } else {
            Err(TransportError::WorkerNotRunning)
        }
    }
}

#[async_trait]
impl WorkerTransport for MockWorker {
    async fn start(&mut self) -> g4a_transport::Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Start);
        if state.state.is_running() {
            return Ok(());
        }
        if self.config.fail_start {
            return Err(TransportError::ProcessSpawnFailed {
                path: "mock-worker".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        state.state = WorkerState::Running;
        state.pid = Some(NEXT_MOCK_PID.fetch_add(1, Ordering::Relaxed));
        Ok(())
    }

    async fn stop(&mut self, force_kill_timeout: Duration) -> g4a_transport::Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Stop);
        state.last_stop_timeout = Some(force_kill_timeout);
        state.state = WorkerState::Stopped;
        state.pid = None;
        Ok(())
    }

    async fn send(&mut self, message: &str) -> g4a_transport::Result<()> {
        self.require_running()?;
        let mut state = self.lock();
        state.calls.push(MockCall::Send(message.to_string()));
        state.last_sent = Some(message.to_string());
        Ok(())
    }

    async fn read_response(&mut self, _options: &ReadOptions) -> g4a_transport::Result<String> {
        self.require_running()?;
        self.lock().calls.push(MockCall::Read);

        if let Some(delay) = self.config.response_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        let response = match state.responses.pop_front() {
            Some(response) => response,
            None if self.config.echo => state.last_sent.clone().unwrap_or_default(),
            None => String::new(),
        };
        Ok(response)
    }

    fn state(&mut self) -> WorkerState {
        self.lock().state
    }

    fn pid(&self) -> Option<u32> {
        self.lock().pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_requires_start() {
        let mut mock = MockWorker::new();
        assert!(mock.send("hi").await.unwrap_err().is_not_running());
        assert!(
            mock.read_response(&ReadOptions::default())
                .await
                .unwrap_err()
                .is_not_running()
        );
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mock_queue_then_echo() {
        let mut mock = MockWorker::with_config(MockConfig {
            echo: true,
            ..Default::default()
        });
        mock.enqueue_response("queued");
        mock.start().await.unwrap();

        let options = ReadOptions::default();
        assert_eq!(mock.exchange("first", &options).await.unwrap(), "queued");
        assert_eq!(mock.exchange("second", &options).await.unwrap(), "second");
        assert_eq!(mock.sent_lines(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_mock_fail_start() {
        let mut mock = MockWorker::with_config(MockConfig {
            fail_start: true,
            ..Default::default()
        });
        let err = mock.start().await.unwrap_err();
        assert!(matches!(err, TransportError::ProcessSpawnFailed { .. }));
        assert_eq!(WorkerTransport::state(&mut mock), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let observer = MockWorker::new();
        let mut driver = observer.clone();
        driver.start().await.unwrap();

        assert_eq!(observer.state_snapshot(), WorkerState::Running);
        assert!(observer.pid().is_some());

        observer.crash();
        assert_eq!(WorkerTransport::state(&mut driver), WorkerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_delay() {
        let mut mock = MockWorker::with_config(MockConfig {
            response_delay: Some(Duration::from_millis(750)),
            ..Default::default()
        });
        mock.start().await.unwrap();

        let started = tokio::time::Instant::now();
        mock.read_response(&ReadOptions::default()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(750));
    }
}
