//! Message records
//!
//! A message is one line of a conversation: either something the user typed or a
//! response produced by the worker process.

use crate::error::ProtocolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender name recorded for user-authored messages
pub const USER_SENDER: &str = "user";

/// Sender name recorded for worker responses
pub const WORKER_SENDER: &str = "gpt4all";

/// Kind of message stored in a conversation
///
/// Serialized as its integer discriminant, matching the column layout of the
/// message table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum MessageType {
    /// Regular conversational message
    #[default]
    Normal,

    /// Conditioning text that primes the model but is not shown as chat
    Conditioning,
}

impl From<MessageType> for i32 {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Normal => 0,
            MessageType::Conditioning => 1,
        }
    }
}

impl TryFrom<i32> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Conditioning),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// A message that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Who sent the message. Usually the user's name or the worker's name
    pub sender: String,

    /// The message text
    pub content: String,

    /// Message kind
    #[serde(rename = "type", default)]
    pub message_type: MessageType,

    /// Ordering rank among siblings
    #[serde(default)]
    pub rank: i32,

    /// Id of the message this one answers (0 = none)
    #[serde(default)]
    pub parent: u64,
}

impl NewMessage {
    /// Create a normal message from an arbitrary sender
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            message_type: MessageType::Normal,
            rank: 0,
            parent: 0,
        }
    }

    /// Message typed by the user
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(USER_SENDER, content)
    }

    /// Response produced by the worker
    pub fn worker(content: impl Into<String>) -> Self {
        Self::new(WORKER_SENDER, content)
    }

    /// Set the parent message id
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = parent;
        self
    }

    /// Set the message kind
    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }
}

/// A persisted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier
    pub id: u64,

    /// Conversation the message belongs to
    pub conversation_id: u64,

    /// Who sent the message
    pub sender: String,

    /// The message text
    pub content: String,

    /// Message kind
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Ordering rank among siblings
    pub rank: i32,

    /// Id of the message this one answers (0 = none)
    pub parent: u64,

    /// When the message was stored
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Materialize a draft with its assigned identifiers
    pub fn from_new(id: u64, conversation_id: u64, draft: NewMessage) -> Self {
        Self {
            id,
            conversation_id,
            sender: draft.sender,
            content: draft.content,
            message_type: draft.message_type,
            rank: draft.rank,
            parent: draft.parent,
            created_at: Utc::now(),
        }
    }

    /// Whether the worker produced this message
    pub fn is_from_worker(&self) -> bool {
        self.sender == WORKER_SENDER
    }
}
