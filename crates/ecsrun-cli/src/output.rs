//! Rendering of log records on stdout.

use chrono::{DateTime, SecondsFormat};

use ecsrun_core::{LogRecord, TaggedRecord};

/// How records are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `<rfc3339 time> <message>`, prefixed with `[task_id]` when tagged.
    Text { tagged: bool },
    /// One JSON object per line.
    Json,
}

/// RFC 3339 UTC time for an epoch-millisecond timestamp. Out-of-range
/// values are printed as the raw number.
pub fn format_timestamp(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => millis.to_string(),
    }
}

pub fn format_record(record: &LogRecord) -> String {
    format!(
        "{} {}",
        format_timestamp(record.timestamp),
        record.message.trim_end_matches(['\r', '\n'])
    )
}

pub fn format_tagged(tagged: &TaggedRecord, format: Format) -> anyhow::Result<String> {
    Ok(match format {
        Format::Text { tagged: false } => format_record(&tagged.record),
        Format::Text { tagged: true } => {
            format!("[{}] {}", tagged.task_id, format_record(&tagged.record))
        }
        Format::Json => serde_json::to_string(tagged)?,
    })
}
