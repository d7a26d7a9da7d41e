//! Worker subprocess management
//!
//! Spawns the GPT4All chat executable with piped stdio and supervises it
//! through start and graceful-then-forced stop.

pub mod process;
pub mod supervisor;

pub use process::{INTERACTIVE_FLAG, WorkerConfig, WorkerProcess, is_stderr_noise};
pub use supervisor::{DEFAULT_FORCE_KILL_TIMEOUT, WorkerSupervisor};
