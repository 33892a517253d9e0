//! Polling tail over a single remote log stream.
//!
//! A [`LogTail`] is an explicit `Idle -> Polling -> Closed` state machine.
//! Every transition happens under one mutex, and closing also fires a
//! [`CancellationToken`] that interrupts whichever suspension point the
//! poll loop is parked on (the remote call or the interval timer).
//!
//! The stream returned by [`LogTail::into_stream`] is lazy: nothing is
//! fetched until the consumer first polls it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{LogRecordStream, LogStore, LogTarget};
use crate::error::TailError;

/// Tuning for a [`LogTail`].
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Delay between the end of one poll and the start of the next.
    pub polling_interval: Duration,
}

impl TailConfig {
    pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(1000);

    pub fn with_interval(polling_interval: Duration) -> Self {
        Self { polling_interval }
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            polling_interval: Self::DEFAULT_POLLING_INTERVAL,
        }
    }
}

/// Lifecycle of a [`LogTail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, not yet consumed.
    Idle,
    /// The poll loop is running.
    Polling,
    /// Closed explicitly or after a remote failure. Terminal.
    Closed,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StreamState::Idle => "idle",
            StreamState::Polling => "polling",
            StreamState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// State shared between the poll loop and every [`TailCloser`].
#[derive(Debug)]
struct TailShared {
    state: Mutex<StreamState>,
    cancel: CancellationToken,
}

impl TailShared {
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        // A poisoned lock still holds a valid enum value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle -> Polling. Returns `false` if the tail was closed first.
    fn begin_polling(&self) -> bool {
        let mut state = self.lock();
        match *state {
            StreamState::Closed => false,
            _ => {
                *state = StreamState::Polling;
                true
            }
        }
    }

    /// Any -> Closed. Returns `true` if this call performed the transition.
    fn close(&self) -> bool {
        let mut state = self.lock();
        if *state == StreamState::Closed {
            return false;
        }
        *state = StreamState::Closed;
        self.cancel.cancel();
        true
    }
}

/// Cloneable handle that closes a [`LogTail`] from any task.
#[derive(Debug, Clone)]
pub struct TailCloser {
    shared: Arc<TailShared>,
    target: LogTarget,
}

impl TailCloser {
    /// Close the tail. Idempotent.
    ///
    /// Cancels the pending timer or in-flight poll; the stream then ends
    /// without an error. Records from a poll that already completed are
    /// still delivered.
    pub fn close(&self) {
        if self.shared.close() {
            debug!(log_stream = %self.target, "log tail closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.lock() == StreamState::Closed
    }
}

/// Resume point in the remote stream. Never leaves the poll loop.
#[derive(Debug, Default)]
struct PaginationCursor {
    token: Option<String>,
}

impl PaginationCursor {
    fn current(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Move past a page that returned `returned` records.
    ///
    /// While nothing has been read yet, an empty page leaves the cursor
    /// absent so the next poll starts from the beginning again. The store's
    /// forward token for a stream that does not exist yet would otherwise
    /// point past every event written later.
    fn advance(&mut self, returned: usize, next: Option<String>) {
        if self.token.is_none() && returned == 0 {
            return;
        }
        if let Some(next) = next {
            self.token = Some(next);
        }
    }
}

/// Tails one log stream by polling a [`LogStore`] on an interval.
pub struct LogTail {
    store: Arc<dyn LogStore>,
    target: LogTarget,
    polling_interval: Duration,
    shared: Arc<TailShared>,
}

impl std::fmt::Debug for LogTail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogTail")
            .field("store", &self.store.name())
            .field("target", &self.target)
            .field("polling_interval", &self.polling_interval)
            .field("state", &self.state())
            .finish()
    }
}

impl LogTail {
    pub fn new(store: Arc<dyn LogStore>, target: LogTarget, config: &TailConfig) -> Self {
        Self {
            store,
            target,
            polling_interval: config.polling_interval,
            shared: Arc::new(TailShared {
                state: Mutex::new(StreamState::Idle),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn target(&self) -> &LogTarget {
        &self.target
    }

    pub fn state(&self) -> StreamState {
        *self.shared.lock()
    }

    /// A handle that can close this tail after it has been turned into a
    /// stream.
    pub fn close_handle(&self) -> TailCloser {
        TailCloser {
            shared: Arc::clone(&self.shared),
            target: self.target.clone(),
        }
    }

    pub fn close(&self) {
        self.close_handle().close();
    }

    /// Turn the tail into a record stream.
    ///
    /// The stream ends cleanly after [`TailCloser::close`], or yields a
    /// single [`TailError::RemoteRead`] and ends if the store fails. Store
    /// failures are never retried.
    pub fn into_stream(self) -> LogRecordStream {
        let LogTail {
            store,
            target,
            polling_interval,
            shared,
        } = self;

        let stream = async_stream::stream! {
            if !shared.begin_polling() {
                return;
            }

            let mut cursor = PaginationCursor::default();
            let mut polls: u64 = 0;

            loop {
                let result = tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => break,
                    result = store.get_events(&target, cursor.current()) => result,
                };
                polls += 1;

                let page = match result {
                    Ok(page) => page,
                    Err(source) => {
                        shared.close();
                        yield Err(TailError::RemoteRead {
                            log_stream: target.to_string(),
                            source,
                        });
                        return;
                    }
                };

                let returned = page.records.len();
                debug!(
                    log_stream = %target,
                    poll = polls,
                    records = returned,
                    "polled log store"
                );

                for record in page.records {
                    yield Ok(record);
                }
                cursor.advance(returned, page.next_cursor);

                tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => break,
                    _ = tokio::time::sleep(polling_interval) => {}
                }
            }

            shared.close();
        };

        Box::pin(stream)
    }
}
