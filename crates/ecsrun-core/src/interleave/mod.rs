//! Fan-in of several fallible streams into one.
//!
//! Every input is driven by its own task inside a [`JoinSet`] and writes
//! into a shared bounded channel. The channel's sender count is the live
//! input count: the output ends when the last producer finishes and drops
//! its sender. Dropping the output drops the `JoinSet`, which aborts any
//! producer still running.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::error::TailError;
use crate::logs::{LogRecord, LogRecordStream};

/// Buffered items per merged output before producers wait.
const CHANNEL_CAPACITY: usize = 64;

/// Boxed output of [`interleave`].
pub type MergedStream<T, E> = Pin<Box<dyn Stream<Item = Result<T, E>> + Send>>;

/// A log record tagged with the task that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedRecord {
    pub task_id: String,
    pub record: LogRecord,
}

/// Merge `streams` into one stream in arrival order.
///
/// - No order is kept across inputs; each input's own order is kept.
/// - An input that completes is simply dropped from the live set.
/// - The first `Err` from any input is forwarded and ends the output.
/// - With no inputs the output completes immediately.
///
/// Inputs start being consumed on the first poll of the output.
pub fn interleave<S, T, E>(streams: Vec<S>) -> MergedStream<T, E>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let stream = async_stream::stream! {
        let (tx, rx) = mpsc::channel::<Result<T, E>>(CHANNEL_CAPACITY);
        let mut producers = JoinSet::new();
        for input in streams {
            producers.spawn(forward(input, tx.clone()));
        }
        drop(tx);

        let mut merged = ReceiverStream::new(rx);
        while let Some(item) = merged.next().await {
            match item {
                Ok(value) => yield Ok(value),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        while let Some(joined) = producers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "interleaved input task ended abnormally");
            }
        }
    };

    Box::pin(stream)
}

/// Pump one input into the shared channel.
///
/// Stops after forwarding an error or once the output side is gone.
async fn forward<S, T, E>(input: S, tx: mpsc::Sender<Result<T, E>>)
where
    S: Stream<Item = Result<T, E>> + Send,
{
    let mut input = std::pin::pin!(input);
    while let Some(item) = input.next().await {
        let is_err = item.is_err();
        if tx.send(item).await.is_err() || is_err {
            break;
        }
    }
}

/// Interleave per-task log sessions, tagging each record with its task id.
pub fn interleave_sessions(
    sessions: Vec<(String, LogRecordStream)>,
) -> MergedStream<TaggedRecord, TailError> {
    let tagged = sessions
        .into_iter()
        .map(|(task_id, stream)| {
            stream.map(move |item| {
                item.map(|record| TaggedRecord {
                    task_id: task_id.clone(),
                    record,
                })
            })
        })
        .collect();
    interleave(tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    type Item = Result<u32, String>;

    fn boxed(items: Vec<Item>) -> Pin<Box<dyn Stream<Item = Item> + Send>> {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn no_inputs_completes_immediately() {
        let merged = interleave(Vec::<Pin<Box<dyn Stream<Item = Item> + Send>>>::new());
        let items: Vec<Item> = merged.collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn keeps_order_within_one_input() {
        let merged = interleave(vec![boxed(vec![Ok(1), Ok(2), Ok(3)]), boxed(vec![])]);
        let items: Vec<Item> = merged.collect().await;
        assert_eq!(items, vec![Ok(1), Ok(2), Ok(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_input_does_not_block_others() {
        let never: Pin<Box<dyn Stream<Item = Item> + Send>> = Box::pin(stream::pending());
        let mut merged = interleave(vec![never, boxed(vec![Ok(7)])]);

        let first = tokio::time::timeout(Duration::from_secs(1), merged.next())
            .await
            .expect("value from live input should arrive");
        assert_eq!(first, Some(Ok(7)));
    }

    #[tokio::test]
    async fn error_ends_output() {
        let merged = interleave(vec![
            boxed(vec![Err("boom".to_string())]),
            boxed(vec![]),
        ]);
        let items: Vec<Item> = merged.collect().await;
        assert_eq!(items, vec![Err("boom".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_output_aborts_producers() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = SetOnDrop(Arc::clone(&dropped));
        let endless: Pin<Box<dyn Stream<Item = Item> + Send>> = Box::pin(async_stream::stream! {
            let _flag = flag;
            yield Ok(1);
            std::future::pending::<()>().await;
        });

        let mut merged = interleave(vec![endless]);
        assert_eq!(merged.next().await, Some(Ok(1)));
        drop(merged);

        for _ in 0..10 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn sessions_are_tagged_with_task_id() {
        let a: LogRecordStream = Box::pin(stream::iter(vec![Ok(LogRecord::new(1, "from a"))]));
        let b: LogRecordStream = Box::pin(stream::iter(vec![Ok(LogRecord::new(2, "from b"))]));

        let mut items: Vec<TaggedRecord> = interleave_sessions(vec![
            ("task-a".to_string(), a),
            ("task-b".to_string(), b),
        ])
        .map(|item| item.unwrap())
        .collect()
        .await;
        items.sort_by(|x, y| x.task_id.cmp(&y.task_id));

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].task_id, "task-a");
        assert_eq!(items[0].record.message, "from a");
        assert_eq!(items[1].task_id, "task-b");
    }
}
