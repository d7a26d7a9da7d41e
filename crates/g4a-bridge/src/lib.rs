//! Request/response bridge to a GPT4All worker
//!
//! The worker is an interactive chat executable with no protocol: lines in,
//! free text out. This crate puts it behind a cloneable async handle whose
//! calls are queued and run one at a time, and adds a small chat layer that
//! records each turn.
//!
//! # Architecture
//!
//! 1. **Record Layer** (`g4a-protocol`): conversations and messages
//! 2. **Transport Layer** (`g4a-transport`): binary resolution, process supervision, idle-timeout reads
//! 3. **Bridge Layer** (this crate): serialized worker access, configuration, lifecycle events, chat
//!
//! # Usage Example
//!
//! ```no_run
//! use g4a_bridge::{BridgeConfig, ChatService, WorkerBridge};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bridge = WorkerBridge::new(BridgeConfig::from_env()?)?;
//!     bridge.start().await?;
//!
//!     let chat = ChatService::in_memory(bridge.clone());
//!     let conversation = chat.start_conversation(Some("ferrets"), None).await?;
//!     let reply = chat.send_message(conversation.id, "What do ferrets eat?").await?;
//!     println!("{}", reply.content);
//!
//!     bridge.stop().await?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod chat;
pub mod config;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod shutdown;
pub mod testing;

// Re-export commonly used types
pub use bridge::{WorkerBridge, WorkerBridgeBuilder, WorkerStatus};
pub use chat::{ChatService, InMemoryStore, MessageStore};
pub use config::{BridgeConfig, SamplingOptions};
pub use error::{BridgeError, Result};
pub use input::{spawn_line_reader, stdin_lines};
pub use lifecycle::{EventCallback, WorkerEvent};
pub use shutdown::{shutdown_signal, stop_on_signal};

pub use g4a_protocol::{Conversation, Message, NewMessage};
pub use g4a_transport::{ReadOptions, TransportError, WorkerState};
