//! Conversation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a conversation title, in characters
pub const MAX_TITLE_LENGTH: usize = 50;

/// Title used when neither a title nor a first message is supplied
pub const DEFAULT_TITLE: &str = "untitled";

const ELLIPSIS: &str = "...";

/// A conversation between a user and the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Store-assigned identifier
    pub id: u64,

    /// Display title, at most [`MAX_TITLE_LENGTH`] characters
    pub title: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last time a message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation stamped with the current time
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Pick a title for a new conversation.
///
/// An explicit title wins. Otherwise the first message becomes the title,
/// shortened with a trailing ellipsis when it exceeds [`MAX_TITLE_LENGTH`].
/// Empty strings count as absent.
pub fn derive_title(title: Option<&str>, first_message: Option<&str>) -> String {
    let title = title.filter(|t| !t.is_empty());
    let first_message = first_message.filter(|m| !m.is_empty());

    match (title, first_message) {
        (Some(title), _) => title.to_string(),
        (None, Some(message)) if message.chars().count() > MAX_TITLE_LENGTH => {
            let keep = MAX_TITLE_LENGTH - ELLIPSIS.len();
            let mut shortened: String = message.chars().take(keep).collect();
            shortened.push_str(ELLIPSIS);
            shortened
        }
        (None, Some(message)) => message.to_string(),
        (None, None) => DEFAULT_TITLE.to_string(),
    }
}
