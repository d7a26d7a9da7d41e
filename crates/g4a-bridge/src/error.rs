//! Error types for the bridge
//!
//! Each error carries a short recovery hint through [`BridgeError::suggested_action`],
//! so a front end can tell the user what to do without matching on variants.

use g4a_transport::TransportError;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while driving the worker or the chat service
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Resolving, starting or talking to the worker failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// No conversation with this id exists in the store
    #[error("Conversation {0} not found")]
    ConversationNotFound(u64),

    /// The bridge task has shut down
    #[error("Worker bridge closed")]
    Closed,
}

impl BridgeError {
    /// Whether this is a stopped or never-started worker
    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_not_running())
    }

    /// User-facing action to take
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Transport(TransportError::UnsupportedPlatform { .. }) => {
                "No GPT4All build exists for this platform. Point G4A_BINARY at a compatible \
                executable."
            }
            Self::Transport(TransportError::BinaryNotExecutable { .. }) => {
                "Download the GPT4All chat binary into the binaries directory and make it \
                executable (chmod +x)."
            }
            Self::Transport(TransportError::ProcessSpawnFailed { .. }) => {
                "The worker could not be launched. Check that the binary matches this \
                architecture."
            }
            Self::Transport(TransportError::WorkerNotRunning) => {
                "Start the worker before sending messages."
            }
            Self::Transport(TransportError::Io(_)) => {
                "The worker pipe failed. Restart the worker and check its log output."
            }
            Self::Config(_) => "Fix the offending G4A_* environment variable and restart.",
            Self::ConversationNotFound(_) => "Start a new conversation or pick an existing id.",
            Self::Closed => "The bridge was shut down. Create a new one.",
        }
    }
}
