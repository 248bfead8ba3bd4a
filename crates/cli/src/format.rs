//! Output formatting for CLI results.

use chrono::{DateTime, Utc};
use serde_json::json;
use sessiondb::{Error, SessionRecord, SessionStats, SweepReport};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Render a session listing.
pub fn format_records(records: &[SessionRecord], now: DateTime<Utc>, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(records),
        OutputMode::Human if records.is_empty() => "(empty)".to_string(),
        OutputMode::Human => records
            .iter()
            .map(|r| {
                format!(
                    "{}  v{}  updated {}  {}",
                    r.key,
                    r.version,
                    r.updated_at.to_rfc3339(),
                    expiry(r, now)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render one session, or its absence.
pub fn format_record(record: Option<&SessionRecord>, now: DateTime<Utc>, mode: OutputMode) -> String {
    match (record, mode) {
        (None, OutputMode::Json) => "null".to_string(),
        (None, OutputMode::Human) => "(nil)".to_string(),
        (Some(record), OutputMode::Json) => to_json(record),
        (Some(record), OutputMode::Human) => {
            let payload = serde_json::to_string_pretty(&record.payload)
                .unwrap_or_else(|e| format!("<unprintable: {}>", e));
            format!(
                "key:      {}\nversion:  {}\ncreated:  {}\nupdated:  {}\nexpiry:   {}\npayload:  {}",
                record.key,
                record.version,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
                expiry(record, now),
                payload
            )
        }
    }
}

/// Render session counts.
pub fn format_stats(stats: &SessionStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(stats),
        OutputMode::Human => format!(
            "total:    {}\nactive:   {}\nexpired:  {}\nlocks:    {}",
            stats.total, stats.active, stats.expired, stats.tracked_locks
        ),
    }
}

/// Render a sweep outcome.
pub fn format_sweep(report: &SweepReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(report),
        OutputMode::Human => format!(
            "removed {} of {} expired sessions ({} skipped)",
            report.removed, report.examined, report.skipped
        ),
    }
}

/// Render the labels in use.
pub fn format_labels(labels: &[String], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(labels),
        OutputMode::Human if labels.is_empty() => "(empty)".to_string(),
        OutputMode::Human => labels.join("\n"),
    }
}

/// Render a delete count.
pub fn format_deleted(removed: usize, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json!({ "removed": removed }).to_string(),
        OutputMode::Human => format!("(integer) {}", removed),
    }
}

/// Render an error.
pub fn format_error(err: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json!({ "error": err.to_string() }).to_string(),
        OutputMode::Human => format!("(error) {}", err),
    }
}

fn expiry(record: &SessionRecord, now: DateTime<Utc>) -> String {
    match (record.expires_at, record.is_expired(now)) {
        (None, _) => "no expiry".to_string(),
        (Some(at), true) => format!("expired {}", at.to_rfc3339()),
        (Some(at), false) => format!("expires {}", at.to_rfc3339()),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
}
