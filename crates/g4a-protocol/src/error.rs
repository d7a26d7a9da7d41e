//! Error types for record decoding

use std::fmt;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while decoding records
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Numeric message kind with no matching variant
    UnknownMessageType(i32),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMessageType(value) => write!(f, "Unknown message type: {}", value),
        }
    }
}

impl std::error::Error for ProtocolError {}
