//! Bridge configuration

use crate::error::{BridgeError, Result};
use g4a_transport::{
    BinaryDescriptor, DEFAULT_FORCE_KILL_TIMEOUT, INTERACTIVE_FLAG, ReadOptions, WorkerConfig,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default directory holding the worker executables, relative to the working directory
pub const DEFAULT_BIN_DIR: &str = "bin";

/// Default depth of the bridge command queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Optional sampling parameters forwarded to the worker's command line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingOptions {
    /// Nucleus sampling probability mass (`--top_p`)
    pub top_p: Option<f32>,
    /// Number of candidate tokens (`--top_k`)
    pub top_k: Option<u32>,
    /// Penalty for repeated tokens (`--repeat_penalty`)
    pub repeat_penalty: Option<f32>,
    /// Sampling temperature (`--temp`)
    pub temperature: Option<f32>,
}

impl SamplingOptions {
    /// Command-line flags for the set parameters, in a fixed order
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(top_p) = self.top_p {
            args.extend(["--top_p".to_string(), top_p.to_string()]);
        }
        if let Some(top_k) = self.top_k {
            args.extend(["--top_k".to_string(), top_k.to_string()]);
        }
        if let Some(penalty) = self.repeat_penalty {
            args.extend(["--repeat_penalty".to_string(), penalty.to_string()]);
        }
        if let Some(temperature) = self.temperature {
            args.extend(["--temp".to_string(), temperature.to_string()]);
        }
        args
    }
}

/// Configuration for a [`WorkerBridge`](crate::WorkerBridge)
///
/// Controls where the worker executable is found, how it is launched,
/// and the timing of reads and shutdown.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Directory searched for the platform executable
    pub bin_dir: PathBuf,

    /// Explicit executable path, bypassing platform resolution
    pub binary: Option<PathBuf>,

    /// Working directory for the worker; `None` inherits the host's
    pub working_dir: Option<PathBuf>,

    /// Idle timeout and retry bound for response reads
    pub read: ReadOptions,

    /// Grace period between SIGINT and SIGKILL on stop
    pub force_kill_timeout: Duration,

    /// Bound on queued bridge commands
    pub queue_capacity: usize,

    /// Sampling flags for the worker
    pub sampling: SamplingOptions,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from(DEFAULT_BIN_DIR),
            binary: None,
            working_dir: None,
            read: ReadOptions::default(),
            force_kill_timeout: DEFAULT_FORCE_KILL_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sampling: SamplingOptions::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `G4A_*` environment variables
    ///
    /// Unset or empty variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] naming the variable when a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env_var("G4A_BIN_DIR")? {
            config.bin_dir = PathBuf::from(dir);
        }
        if let Some(binary) = env_var("G4A_BINARY")? {
            config.binary = Some(PathBuf::from(binary));
        }
        if let Some(ms) = parse_env::<u64>("G4A_IDLE_TIMEOUT_MS")? {
            config.read.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_env::<u32>("G4A_MAX_RETRIES")? {
            config.read.max_retries = retries;
        }
        if let Some(ms) = parse_env::<u64>("G4A_FORCE_KILL_TIMEOUT_MS")? {
            config.force_kill_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = parse_env::<usize>("G4A_QUEUE_CAPACITY")? {
            config = config.with_queue_capacity(capacity);
        }

        config.sampling = SamplingOptions {
            top_p: parse_env("G4A_TOP_P")?,
            top_k: parse_env("G4A_TOP_K")?,
            repeat_penalty: parse_env("G4A_REPEAT_PENALTY")?,
            temperature: parse_env("G4A_TEMPERATURE")?,
        };

        Ok(config)
    }

    /// Set the binaries directory
    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = dir.into();
        self
    }

    /// Use an explicit executable instead of the platform one
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Set the worker's working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the idle timeout for reads
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.read.idle_timeout = timeout;
        self
    }

    /// Set the retry bound for reads
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.read.max_retries = retries;
        self
    }

    /// Set the SIGINT-to-SIGKILL grace period
    pub fn with_force_kill_timeout(mut self, timeout: Duration) -> Self {
        self.force_kill_timeout = timeout;
        self
    }

    /// Set the command queue bound (minimum 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the sampling flags
    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    /// Path of the worker executable
    ///
    /// # Errors
    ///
    /// Fails with an unsupported-platform error when no override is set and the
    /// host has no published executable.
    pub fn binary_path(&self) -> Result<PathBuf> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => Ok(BinaryDescriptor::host()?.path_in(&self.bin_dir)),
        }
    }

    /// Spawn configuration for the worker: `--interactive` plus sampling flags
    pub fn worker_config(&self) -> Result<WorkerConfig> {
        let mut args = vec![INTERACTIVE_FLAG.to_string()];
        args.extend(self.sampling.to_args());

        let mut worker = WorkerConfig::new(self.binary_path()?).with_args(args);
        if let Some(dir) = &self.working_dir {
            worker = worker.with_working_dir(dir);
        }
        Ok(worker)
    }
}

fn env_var(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(BridgeError::Config(format!(
            "{name} is not valid unicode"
        ))),
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = env_var(name)? else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|err| BridgeError::Config(format!("{name}={raw:?}: {err}")))
}
