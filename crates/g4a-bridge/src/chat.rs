//! Conversations on top of the worker bridge
//!
//! [`ChatService`] turns one user message into one worker exchange and keeps
//! both sides of the turn in a [`MessageStore`]. The bridge knows nothing about
//! conversations; it only sees the text of each turn.

use crate::bridge::WorkerBridge;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use g4a_protocol::{Conversation, Message, NewMessage, derive_title};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence for conversations and their messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create a conversation with the given title
    async fn create_conversation(&self, title: String) -> Result<Conversation>;

    /// Look up a conversation
    async fn conversation(&self, id: u64) -> Result<Option<Conversation>>;

    /// All conversations, oldest first
    async fn conversations(&self) -> Result<Vec<Conversation>>;

    /// Store a message in a conversation.
    ///
    /// # Errors
    ///
    /// [`BridgeError::ConversationNotFound`] if the conversation does not exist.
    async fn append_message(&self, conversation_id: u64, draft: NewMessage) -> Result<Message>;

    /// Messages of a conversation in insertion order
    async fn messages(&self, conversation_id: u64) -> Result<Vec<Message>>;
}

#[derive(Debug, Default)]
struct StoreData {
    next_conversation_id: u64,
    next_message_id: u64,
    conversations: Vec<Conversation>,
    messages: HashMap<u64, Vec<Message>>,
}

/// [`MessageStore`] held entirely in memory
///
/// Ids start at 1 and are never reused.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: Arc<RwLock<StoreData>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn create_conversation(&self, title: String) -> Result<Conversation> {
        let mut data = self.data.write().await;
        data.next_conversation_id += 1;
        let conversation = Conversation::new(data.next_conversation_id, title);
        data.conversations.push(conversation.clone());
        data.messages.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn conversation(&self, id: u64) -> Result<Option<Conversation>> {
        let data = self.data.read().await;
        Ok(data.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.data.read().await.conversations.clone())
    }

    async fn append_message(&self, conversation_id: u64, draft: NewMessage) -> Result<Message> {
        let mut data = self.data.write().await;
        let conversation = data
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or(BridgeError::ConversationNotFound(conversation_id))?;
        conversation.touch();

        data.next_message_id += 1;
        let message = Message::from_new(data.next_message_id, conversation_id, draft);
        data.messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn messages(&self, conversation_id: u64) -> Result<Vec<Message>> {
        let data = self.data.read().await;
        data.messages
            .get(&conversation_id)
            .cloned()
            .ok_or(BridgeError::ConversationNotFound(conversation_id))
    }
}

/// Chat front end: persists each turn and runs it through the worker
#[derive(Clone)]
pub struct ChatService<S = InMemoryStore> {
    bridge: WorkerBridge,
    store: S,
}

impl ChatService<InMemoryStore> {
    /// Chat service backed by an [`InMemoryStore`]
    pub fn in_memory(bridge: WorkerBridge) -> Self {
        Self::new(bridge, InMemoryStore::new())
    }
}

impl<S: MessageStore> ChatService<S> {
    /// Create a chat service over `store`
    pub fn new(bridge: WorkerBridge, store: S) -> Self {
        Self { bridge, store }
    }

    /// The underlying bridge
    pub fn bridge(&self) -> &WorkerBridge {
        &self.bridge
    }

    /// Open a conversation.
    ///
    /// The title is `title` if given, else derived from `first_message`. The
    /// first message is stored but not sent to the worker.
    pub async fn start_conversation(
        &self,
        title: Option<&str>,
        first_message: Option<&str>,
    ) -> Result<Conversation> {
        let conversation = self
            .store
            .create_conversation(derive_title(title, first_message))
            .await?;
        debug!(id = conversation.id, title = %conversation.title, "Conversation created");

        if let Some(text) = first_message.filter(|m| !m.is_empty()) {
            self.store
                .append_message(conversation.id, NewMessage::user(text))
                .await?;
        }
        Ok(conversation)
    }

    /// Run one turn: store the user message, ask the worker, store its reply.
    ///
    /// Returns the stored reply. The user message stays stored if the
    /// exchange fails.
    pub async fn send_message(&self, conversation_id: u64, text: &str) -> Result<Message> {
        let question = self
            .store
            .append_message(conversation_id, NewMessage::user(text))
            .await?;

        let answer = self.bridge.exchange(text).await?;

        self.store
            .append_message(
                conversation_id,
                NewMessage::worker(answer).with_parent(question.id),
            )
            .await
    }

    /// Look up a conversation
    pub async fn conversation(&self, id: u64) -> Result<Conversation> {
        self.store
            .conversation(id)
            .await?
            .ok_or(BridgeError::ConversationNotFound(id))
    }

    /// All conversations
    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.store.conversations().await
    }

    /// Messages of a conversation in order
    pub async fn messages(&self, conversation_id: u64) -> Result<Vec<Message>> {
        self.store.messages(conversation_id).await
    }

    /// Most recent message of a conversation, if any
    pub async fn last_message(&self, conversation_id: u64) -> Result<Option<Message>> {
        Ok(self.store.messages(conversation_id).await?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_assigns_increasing_ids() {
        let store = InMemoryStore::new();
        let a = store.create_conversation("a".into()).await.unwrap();
        let b = store.create_conversation("b".into()).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let m1 = store.append_message(a.id, NewMessage::user("x")).await.unwrap();
        let m2 = store.append_message(b.id, NewMessage::user("y")).await.unwrap();
        assert!(m2.id > m1.id);
        assert_eq!(store.conversations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_unknown_conversation() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.append_message(9, NewMessage::user("lost")).await,
            Err(BridgeError::ConversationNotFound(9))
        ));
        assert!(matches!(
            store.messages(9).await,
            Err(BridgeError::ConversationNotFound(9))
        ));
        assert!(store.conversation(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_touches_conversation() {
        let store = InMemoryStore::new();
        let created = store.create_conversation("t".into()).await.unwrap();
        store
            .append_message(created.id, NewMessage::user("hi"))
            .await
            .unwrap();

        let updated = store.conversation(created.id).await.unwrap().unwrap();
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }
}
