//! Process bridge to an interactive GPT4All worker
//!
//! The worker is a chat executable that reads free-text lines on stdin and
//! prints free-text replies on stdout, with no framing of any kind. This crate
//! finds the right executable for the host, supervises the process, and turns
//! its output back into one clean string per request.
//!
//! # Architecture
//!
//! - **Binary resolution**: [`BinaryDescriptor`] maps OS/architecture to an executable
//! - **Supervision**: [`WorkerSupervisor`] spawns and stops the worker (SIGINT, then SIGKILL)
//! - **Exchange**: [`read_until_idle`] treats output silence as end of reply
//! - **Sanitizing**: [`sanitize`] strips colour codes and the trailing `>` prompt
//!
//! # Usage
//!
//! ```no_run
//! use g4a_transport::{BinaryDescriptor, ReadOptions, WorkerConfig, WorkerSupervisor};
//! use g4a_transport::DEFAULT_FORCE_KILL_TIMEOUT;
//!
//! # async fn run() -> g4a_transport::Result<()> {
//! let binary = BinaryDescriptor::host()?.path_in("bin");
//! let mut worker = WorkerSupervisor::new(WorkerConfig::new(binary));
//! worker.start().await?;
//! worker.send("Tell me about ferrets").await?;
//! let reply = worker.read_response(&ReadOptions::default()).await?;
//! println!("{reply}");
//! worker.stop(DEFAULT_FORCE_KILL_TIMEOUT).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod exchange;
pub mod platform;
pub mod sanitize;
pub mod state;
pub mod subprocess;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use exchange::{
    CycleOutcome, ExchangeAttempt, LINE_ENDING, ReadOptions, read_until_idle, send_line,
};
pub use platform::{BinaryDescriptor, Platform};
pub use sanitize::{PROMPT_MARKER, is_bare_prompt, sanitize};
pub use state::WorkerState;
pub use subprocess::{DEFAULT_FORCE_KILL_TIMEOUT, INTERACTIVE_FLAG, WorkerConfig, WorkerSupervisor};
pub use traits::WorkerTransport;
