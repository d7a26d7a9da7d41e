//! Transport error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while resolving, supervising or talking to the worker
#[derive(Debug, Error)]
pub enum TransportError {
    /// No worker executable is published for this OS/architecture pair
    #[error("Unsupported platform {os} on {arch}")]
    UnsupportedPlatform {
        /// Operating system identifier (`std::env::consts::OS` style)
        os: String,
        /// CPU architecture identifier (`std::env::consts::ARCH` style)
        arch: String,
    },

    /// The worker binary is missing or lacks execute permission
    #[error(
        "Binary {} is not executable. Make sure the file exists and the permissions are set correctly",
        .path.display()
    )]
    BinaryNotExecutable {
        /// Path that was checked
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The operating system refused to start the worker
    #[error("Error while starting worker process {}: {source}", .path.display())]
    ProcessSpawnFailed {
        /// Path that was spawned
        path: PathBuf,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// An operation needed a running worker and there is none
    #[error("Worker process not running. Call start() first")]
    WorkerNotRunning,

    /// Stream read/write error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this is [`TransportError::WorkerNotRunning`]
    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::WorkerNotRunning)
    }
}
