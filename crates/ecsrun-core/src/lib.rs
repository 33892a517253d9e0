//! Launch containerized tasks on an ECS cluster and stream their logs.
//!
//! ```text
//! TaskLauncher::launch --> TaskHandle
//!        |
//!        v
//! TaskLogSession::open
//!     wait running (TaskGate)
//!     LogTail ---- polls ----> LogStore::get_events
//!     stop watcher (TaskGate) --close--> TailCloser
//!        |
//!        v
//! interleave([session, session, ...]) --> one output stream
//! ```

pub mod aws;
pub mod error;
pub mod interleave;
pub mod launcher;
pub mod logs;
pub mod scheduler;
pub mod session;

pub use error::TailError;
pub use interleave::{TaggedRecord, interleave, interleave_sessions};
pub use launcher::{LaunchOptions, LaunchType, LogConfig, TaskHandle, TaskLauncher};
pub use logs::tail::{LogTail, StreamState, TailCloser, TailConfig};
pub use logs::{LogPage, LogRecord, LogRecordStream, LogStore, LogTarget};
pub use scheduler::gate::TaskGate;
pub use scheduler::{Scheduler, TaskCondition};
pub use session::TaskLogSession;
