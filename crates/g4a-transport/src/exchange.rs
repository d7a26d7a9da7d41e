//! Line exchange with the worker
//!
//! The worker has no framing: a reply is whatever it prints until it goes
//! quiet. [`read_until_idle`] treats `idle_timeout` of silence as the end of a
//! reply and re-arms the read up to `max_retries` times when all it caught was
//! an empty line or the bare prompt, which the worker prints before it has
//! started generating.

use crate::error::Result;
use crate::sanitize::{is_bare_prompt, sanitize};
use crate::subprocess::WorkerSupervisor;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, trace};

/// Line terminator the worker expects on stdin
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";

/// Line terminator the worker expects on stdin
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

const READ_CHUNK_SIZE: usize = 4096;

/// Tuning for a single response read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Silence after which the accumulated output counts as a response
    pub idle_timeout: Duration,
    /// Extra cycles allowed when a cycle yields nothing useful
    pub max_retries: u32,
}

impl ReadOptions {
    /// Default idle timeout
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1_000);
    /// Default retry bound
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set the retry bound
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }
}

/// What to do once an idle cycle has ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing useful arrived; read another cycle
    Retry,
    /// Sanitized response
    Complete(String),
}

/// State of one in-progress response read
#[derive(Debug)]
pub struct ExchangeAttempt {
    buffer: Vec<u8>,
    retry_count: u32,
    max_retries: u32,
}

impl ExchangeAttempt {
    /// Fresh attempt with an empty buffer
    pub fn new(max_retries: u32) -> Self {
        Self {
            buffer: Vec::new(),
            retry_count: 0,
            max_retries,
        }
    }

    /// Append a raw stdout chunk
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Cycles already retried
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Close the current idle cycle.
    ///
    /// Bytes are decoded here rather than per chunk so a multi-byte character
    /// split across two reads stays intact.
    pub fn conclude_cycle(&mut self) -> CycleOutcome {
        let candidate = sanitize(&String::from_utf8_lossy(&self.buffer));
        self.buffer.clear();

        let unusable = candidate.is_empty() || is_bare_prompt(&candidate);
        if unusable && self.retry_count < self.max_retries {
            self.retry_count += 1;
            CycleOutcome::Retry
        } else {
            CycleOutcome::Complete(candidate)
        }
    }

    /// Sanitize whatever has accumulated, without retrying
    pub fn into_response(self) -> String {
        sanitize(&String::from_utf8_lossy(&self.buffer))
    }
}

/// Write `message` plus [`LINE_ENDING`] and flush
pub async fn send_line<W>(writer: &mut W, message: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let line = format!("{message}{LINE_ENDING}");
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one response from `reader` using the idle-timeout heuristic.
///
/// End of stream completes the current cycle at once.
pub async fn read_until_idle<R>(reader: &mut R, options: &ReadOptions) -> Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut attempt = ExchangeAttempt::new(options.max_retries);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match timeout(options.idle_timeout, reader.read(&mut chunk)).await {
            Ok(Ok(0)) => {
                debug!("Worker stdout closed mid-response");
                return Ok(attempt.into_response());
            }
            Ok(Ok(n)) => {
                trace!(bytes = n, "Worker output chunk");
                attempt.push(&chunk[..n]);
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => match attempt.conclude_cycle() {
                CycleOutcome::Retry => {
                    debug!(retry = attempt.retry_count(), "Empty response, reading again");
                }
                CycleOutcome::Complete(response) => {
                    debug!(len = response.len(), "Response complete");
                    return Ok(response);
                }
            },
        }
    }
}

impl WorkerSupervisor {
    /// Write one line to the worker's stdin.
    ///
    /// # Errors
    ///
    /// [`TransportError::WorkerNotRunning`](crate::TransportError::WorkerNotRunning)
    /// without a worker, [`TransportError::Io`](crate::TransportError::Io) if the
    /// write fails.
    pub async fn send(&mut self, message: &str) -> Result<()> {
        let worker = self.running_worker()?;
        debug!(pid = ?worker.pid(), bytes = message.len(), "Sending line to worker");
        send_line(&mut worker.stdin, message).await
    }

    /// Read the worker's next response.
    pub async fn read_response(&mut self, options: &ReadOptions) -> Result<String> {
        let worker = self.running_worker()?;
        read_until_idle(&mut worker.stdout, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use tokio::io::{DuplexStream, duplex};
    use tokio::time::{Instant, sleep};

    fn pipe() -> (DuplexStream, DuplexStream) {
        duplex(1024)
    }

    #[test]
    fn test_default_options() {
        let options = ReadOptions::default();
        assert_eq!(options.idle_timeout, Duration::from_millis(1000));
        assert_eq!(options.max_retries, 2);
    }

    #[test]
    fn test_attempt_retries_are_bounded() {
        let mut attempt = ExchangeAttempt::new(2);
        assert_eq!(attempt.conclude_cycle(), CycleOutcome::Retry);
        attempt.push(b"> ");
        assert_eq!(attempt.conclude_cycle(), CycleOutcome::Retry);
        assert_eq!(attempt.conclude_cycle(), CycleOutcome::Complete(String::new()));
        assert_eq!(attempt.retry_count(), 2);
    }

    #[test]
    fn test_attempt_joins_split_utf8() {
        let mut attempt = ExchangeAttempt::new(0);
        let bytes = "héllo".as_bytes();
        attempt.push(&bytes[..2]);
        attempt.push(&bytes[2..]);
        assert_eq!(attempt.conclude_cycle(), CycleOutcome::Complete("héllo".into()));
    }

    #[test]
    fn test_bare_prompt_returned_once_retries_exhausted() {
        let mut attempt = ExchangeAttempt::new(0);
        attempt.push(b"> >");
        assert_eq!(attempt.conclude_cycle(), CycleOutcome::Complete(">".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_within_idle_window_accumulate() {
        let (mut worker, mut host) = pipe();
        let writer = tokio::spawn(async move {
            worker.write_all(b"a").await.unwrap();
            sleep(Duration::from_millis(500)).await;
            worker.write_all(b"b").await.unwrap();
            sleep(Duration::from_secs(60)).await;
            drop(worker);
        });

        let started = Instant::now();
        let response = read_until_idle(&mut host, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(response, "ab");
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(started.elapsed() < Duration::from_millis(2000));
        writer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_longer_than_idle_splits_response() {
        let (mut worker, mut host) = pipe();
        let writer = tokio::spawn(async move {
            worker.write_all(b"a").await.unwrap();
            sleep(Duration::from_millis(1500)).await;
            worker.write_all(b"b").await.unwrap();
            sleep(Duration::from_secs(60)).await;
            drop(worker);
        });

        let response = read_until_idle(&mut host, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(response, "a");
        writer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_worker_yields_empty_after_all_cycles() {
        let (_worker, mut host) = pipe();

        let started = Instant::now();
        let response = read_until_idle(&mut host, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(response, "");

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_only_cycle_is_retried() {
        let (mut worker, mut host) = pipe();
        let writer = tokio::spawn(async move {
            worker.write_all(b"\x1b[0m> ").await.unwrap();
            sleep(Duration::from_millis(1500)).await;
            worker.write_all(b"\x1b[33mhi\x1b[0m\n> ").await.unwrap();
            sleep(Duration::from_secs(60)).await;
            drop(worker);
        });

        let started = Instant::now();
        let response = read_until_idle(&mut host, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(response, "hi");
        assert!(started.elapsed() >= Duration::from_millis(2500));
        writer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_eof_completes_immediately() {
        let (mut worker, mut host) = pipe();
        worker.write_all(b"partial answer\n").await.unwrap();
        drop(worker);

        let started = Instant::now();
        let response = read_until_idle(&mut host, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(response, "partial answer");
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eof_without_output_does_not_retry() {
        let (worker, mut host) = pipe();
        drop(worker);

        let started = Instant::now();
        let response = read_until_idle(&mut host, &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(response, "");
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_send_line_appends_terminator() {
        let expected = format!("what is rust?{LINE_ENDING}");
        let mut stdin = tokio_test::io::Builder::new()
            .write(expected.as_bytes())
            .build();

        send_line(&mut stdin, "what is rust?").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_line_surfaces_write_error() {
        let mut stdin = tokio_test::io::Builder::new()
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "worker gone",
            ))
            .build();

        match send_line(&mut stdin, "hello").await {
            Err(TransportError::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_supervisor_exchange_requires_worker() {
        let mut supervisor =
            WorkerSupervisor::new(crate::subprocess::WorkerConfig::new("/nonexistent"));

        assert!(supervisor.send("hello").await.unwrap_err().is_not_running());
        assert!(
            supervisor
                .read_response(&ReadOptions::default())
                .await
                .unwrap_err()
                .is_not_running()
        );
    }
}
