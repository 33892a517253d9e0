//! Log records and the remote log store interface.
//!
//! [`LogStore`] is the seam between the tailing logic in [`tail`] and the
//! backend that actually fetches events (the `aws` CLI in production,
//! scripted fakes in tests).

pub mod tail;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::TailError;

/// A single log line read from the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Event time in epoch milliseconds.
    pub timestamp: i64,
    pub message: String,
}

impl LogRecord {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// One page of events returned by [`LogStore::get_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPage {
    pub records: Vec<LogRecord>,
    /// Resume point for the next call. Opaque to the caller.
    pub next_cursor: Option<String>,
}

/// Names a single remote log stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogTarget {
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl LogTarget {
    pub fn new(log_group_name: impl Into<String>, log_stream_name: impl Into<String>) -> Self {
        Self {
            log_group_name: log_group_name.into(),
            log_stream_name: log_stream_name.into(),
        }
    }
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.log_group_name, self.log_stream_name)
    }
}

/// Boxed stream of log records as handed to consumers.
pub type LogRecordStream = Pin<Box<dyn Stream<Item = Result<LogRecord, TailError>> + Send>>;

/// Append-only remote log source.
///
/// Object-safe so it can be shared as `Arc<dyn LogStore>` between
/// concurrently running sessions.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Human-readable backend name (e.g. "aws-cli").
    fn name(&self) -> &str;

    /// Fetch events for `target` after `cursor`.
    ///
    /// `None` means "from the beginning of the stream".
    async fn get_events(&self, target: &LogTarget, cursor: Option<&str>) -> Result<LogPage>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn LogStore) {}
};
