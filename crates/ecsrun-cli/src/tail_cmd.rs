//! `ecsrun tail`: follow one log stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;

use ecsrun_core::aws::{AwsCli, AwsCliLogStore};
use ecsrun_core::{LogStore, LogTail, LogTarget, TaggedRecord, TailConfig};

use crate::output::Format;
use crate::run_cmd::print_records;

pub async fn run_tail(
    region: Option<String>,
    target: LogTarget,
    interval: Duration,
    json: bool,
) -> Result<()> {
    let store: Arc<dyn LogStore> = Arc::new(AwsCliLogStore::new(AwsCli::new(region)));
    let tail = LogTail::new(store, target, &TailConfig::with_interval(interval));
    eprintln!("Tailing {} (Ctrl+C to stop)", tail.target());

    let cancel = crate::shutdown::ctrl_c_token();
    let task_id = tail.target().log_stream_name.clone();
    let records = tail.into_stream().map(move |item| {
        item.map(|record| TaggedRecord {
            task_id: task_id.clone(),
            record,
        })
    });

    let format = if json {
        Format::Json
    } else {
        Format::Text { tagged: false }
    };
    print_records(records, format, &cancel, &mut std::io::stdout()).await?;
    Ok(())
}
