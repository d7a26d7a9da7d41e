//! Shared record types for the g4a bridge crates
//!
//! This crate holds the conversation and message records that sit on top of the
//! worker bridge. The bridge itself never sees these types; they belong to the
//! chat layer that persists each request/response turn.
//!
//! # Type Organization
//!
//! - **Conversations**: [`conversation`] - conversation records and title derivation
//! - **Messages**: [`message`] - persisted messages, drafts and message kinds
//! - **Error types**: [`error`] - record decoding errors
//!
//! # Design Principles
//!
//! - **Zero I/O**: All types are pure data structures
//! - **Serialization**: serde-based, timestamps via chrono

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conversation;
pub mod error;
pub mod message;

// Re-export commonly used types at crate level
pub use conversation::{Conversation, DEFAULT_TITLE, MAX_TITLE_LENGTH, derive_title};
pub use error::{ProtocolError, Result};
pub use message::{Message, MessageType, NewMessage, USER_SENDER, WORKER_SENDER};
