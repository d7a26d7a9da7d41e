//! Worker process spawning and termination

use crate::error::{Result, TransportError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncReadExt, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Flag that puts the GPT4All chat executable into line-interactive mode
pub const INTERACTIVE_FLAG: &str = "--interactive";

/// Configuration for spawning the worker process
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Path to the worker executable
    pub binary_path: PathBuf,

    /// Arguments to pass to the worker
    pub args: Vec<String>,

    /// Working directory; `None` inherits the host's current directory
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables, layered on top of the inherited environment
    pub env: HashMap<String, String>,
}

impl WorkerConfig {
    /// Create a configuration that runs `binary_path --interactive`
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: vec![INTERACTIVE_FLAG.to_string()],
            working_dir: None,
            env: HashMap::new(),
        }
    }

    /// Append an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the whole argument list
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run the worker from `dir` instead of the current directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the worker.
    ///
    /// The host environment is always inherited; this only adds or overrides.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Check that `path` is a regular file the current user may execute
pub(crate) async fn ensure_executable(path: &Path) -> std::io::Result<()> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }

    #[cfg(unix)]
    nix::unistd::access(path, nix::unistd::AccessFlags::X_OK)?;

    Ok(())
}

/// Whether a stderr chunk carries no diagnostic value
///
/// The worker prints a lone `.` repeatedly while the model loads.
pub fn is_stderr_noise(chunk: &str) -> bool {
    let trimmed = chunk.trim();
    trimmed.is_empty() || trimmed == "."
}

/// A spawned worker with its pipes attached
pub struct WorkerProcess {
    pub(crate) child: Child,
    pub(crate) pid: Option<u32>,
    pub(crate) stdin: BufWriter<ChildStdin>,
    pub(crate) stdout: ChildStdout,
    stderr_task: JoinHandle<()>,
}

impl WorkerProcess {
    /// Spawn the worker described by `config`
    pub(crate) async fn spawn(config: &WorkerConfig) -> Result<Self> {
        let spawn_failed = |source: std::io::Error| TransportError::ProcessSpawnFailed {
            path: config.binary_path.clone(),
            source,
        };

        let working_dir = match &config.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(spawn_failed)?,
        };

        let mut cmd = Command::new(&config.binary_path);
        cmd.args(&config.args)
            .current_dir(working_dir)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(spawn_failed)?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_failed(std::io::Error::other("worker stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failed(std::io::Error::other("worker stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_failed(std::io::Error::other("worker stderr not captured")))?;

        Ok(Self {
            child,
            pid,
            stdin: BufWriter::new(stdin),
            stdout,
            stderr_task: spawn_stderr_logger(stderr, pid),
        })
    }

    /// OS process id
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status if the process has already terminated
    pub(crate) fn try_exit_status(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Interrupt the worker, escalating to a kill after `force_kill_timeout`.
    ///
    /// Returns once the process has exited (or could not be killed at all).
    pub(crate) async fn terminate(mut self, force_kill_timeout: Duration) -> Option<ExitStatus> {
        self.interrupt();

        match timeout(force_kill_timeout, self.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(err)) => {
                warn!(pid = ?self.pid, "Waiting for worker exit failed: {}", err);
                self.force_kill().await
            }
            Err(_) => {
                warn!(pid = ?self.pid, ?force_kill_timeout, "Force killing worker process");
                self.force_kill().await
            }
        }
    }

    /// SIGKILL the worker and reap it
    async fn force_kill(&mut self) -> Option<ExitStatus> {
        if let Err(err) = self.child.start_kill() {
            warn!(pid = ?self.pid, "Killing worker failed: {}", err);
        }
        match self.child.wait().await {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(pid = ?self.pid, "Reaping killed worker failed: {}", err);
                None
            }
        }
    }

    #[cfg(unix)]
    fn interrupt(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = self.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        if let Err(errno) = kill(Pid::from_raw(pid), Signal::SIGINT) {
            debug!(pid, "SIGINT delivery failed: {}", errno);
        }
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) {
        // No console-interrupt equivalent for a piped child; terminate directly.
        if let Err(err) = self.child.start_kill() {
            debug!(pid = ?self.pid, "Terminating worker failed: {}", err);
        }
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        self.stderr_task.abort();
    }
}

/// Forward worker diagnostics from stderr to the log
fn spawn_stderr_logger(mut stderr: ChildStderr, pid: Option<u32>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        loop {
            match stderr.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]);
                    if !is_stderr_noise(&chunk) {
                        debug!(?pid, "Worker stderr: {}", chunk.trim());
                    }
                }
                Err(err) => {
                    debug!(?pid, "Worker stderr closed: {}", err);
                    break;
                }
            }
        }
    })
}
