//! Worker lifecycle events
//!
//! The bridge reports each start, stop and completed exchange to an optional
//! callback, so a host can log or meter worker activity without polling.
//!
//! # Example
//!
//! ```no_run
//! use g4a_bridge::{BridgeConfig, WorkerBridge, WorkerEvent};
//!
//! # async fn run() -> g4a_bridge::Result<()> {
//! let bridge = WorkerBridge::builder(BridgeConfig::from_env()?)
//!     .on_event(|event| {
//!         if let WorkerEvent::Started { pid } = event {
//!             println!("worker up: {pid:?}");
//!         }
//!     })
//!     .spawn()?;
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Callback invoked for every [`WorkerEvent`]
pub type EventCallback = Arc<dyn Fn(&WorkerEvent) + Send + Sync>;

/// Lifecycle events for the supervised worker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// Worker process spawned
    Started {
        /// OS process id
        pid: Option<u32>,
    },

    /// Worker failed to start
    StartFailed {
        /// Error description
        error: String,
    },

    /// Worker process has exited after a stop
    Stopped,

    /// An exchange was preempted by a stop
    Interrupted {
        /// Exchange that was cut short
        exchange_id: Uuid,
    },

    /// An exchange produced a response
    ExchangeCompleted {
        /// Exchange identifier, also recorded on its tracing span
        exchange_id: Uuid,
        /// Length of the sanitized response in bytes
        response_len: usize,
    },
}

impl WorkerEvent {
    /// Get a human-readable description of this event
    pub fn description(&self) -> String {
        match self {
            WorkerEvent::Started { pid: Some(pid) } => format!("Worker started (pid {})", pid),
            WorkerEvent::Started { pid: None } => "Worker started".to_string(),
            WorkerEvent::StartFailed { error } => format!("Worker failed to start: {}", error),
            WorkerEvent::Stopped => "Worker stopped".to_string(),
            WorkerEvent::Interrupted { exchange_id } => {
                format!("Exchange {} interrupted by stop", exchange_id)
            }
            WorkerEvent::ExchangeCompleted {
                exchange_id,
                response_len,
            } => format!(
                "Exchange {} completed ({} bytes)",
                exchange_id, response_len
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_description() {
        let event = WorkerEvent::Started { pid: Some(4242) };
        assert!(event.description().contains("4242"));
        assert_eq!(WorkerEvent::Started { pid: None }.description(), "Worker started");
    }

    #[test]
    fn test_exchange_completed_description() {
        let exchange_id = Uuid::new_v4();
        let event = WorkerEvent::ExchangeCompleted {
            exchange_id,
            response_len: 17,
        };
        let desc = event.description();
        assert!(desc.contains(&exchange_id.to_string()));
        assert!(desc.contains("17 bytes"));
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(WorkerEvent::Stopped).unwrap();
        assert_eq!(json["event"], "stopped");

        let json = serde_json::to_value(WorkerEvent::StartFailed {
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "start_failed");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_all_events_have_descriptions() {
        let id = Uuid::new_v4();
        let events = vec![
            WorkerEvent::Started { pid: Some(1) },
            WorkerEvent::StartFailed {
                error: "missing".into(),
            },
            WorkerEvent::Stopped,
            WorkerEvent::Interrupted { exchange_id: id },
            WorkerEvent::ExchangeCompleted {
                exchange_id: id,
                response_len: 0,
            },
        ];

        for event in events {
            assert!(!event.description().is_empty());
        }
    }
}
