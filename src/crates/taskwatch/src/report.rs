//! Plain-text rendering of task errors.
//!
//! The layout follows the error panel of the web front-end: the message,
//! then the server's detail fields, then what is known about the task.
//!
//! ```text
//! Task failed: column 'age' has mixed types
//!
//! Details:
//!   Exception: ValueError
//!
//! Stack trace:
//! Traceback (most recent call last): ...
//!
//! Task:
//!   ID: 7f3c
//!   Status: failed
//!   Duration: 2m 5s
//! ```

use crate::error::{ErrorDetails, TaskError, DETAIL_FIELDS};
use crate::task::TaskInfo;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt::Write;

/// Longest summary shown before truncation.
pub const SUMMARY_LIMIT: usize = 200;

fn detail_label(key: &str) -> &str {
    match key {
        "error" => "Error",
        "detail" => "Detail",
        "message" => "Message",
        "exception" => "Exception",
        "warning" => "Warning",
        "code" => "Error code",
        "status_code" => "HTTP status code",
        "exception_type" => "Exception type",
        "exception_message" => "Exception message",
        other => other,
    }
}

/// Full multi-line report for an error.
pub fn render_error(err: &TaskError) -> String {
    let mut out = err.message.clone();

    if let Some(details) = &err.details {
        render_details(&mut out, details);
    }
    if let Some(task) = &err.task {
        render_task(&mut out, task);
    }

    out
}

fn render_details(out: &mut String, details: &ErrorDetails) {
    let known = DETAIL_FIELDS
        .iter()
        .filter(|key| **key != "traceback")
        .filter_map(|key| details.text(key).map(|text| (*key, text)));

    let extra = details
        .as_map()
        .keys()
        .filter(|key| !DETAIL_FIELDS.contains(&key.as_str()))
        .filter_map(|key| details.text(key).map(|text| (key.as_str(), text)));

    let lines: Vec<(&str, String)> = known.chain(extra).collect();
    if !lines.is_empty() {
        out.push_str("\n\nDetails:");
        for (key, text) in lines {
            let _ = write!(out, "\n  {}: {}", detail_label(key), text);
        }
    }

    if let Some(traceback) = details.text("traceback") {
        out.push_str("\n\nStack trace:\n");
        out.push_str(&traceback);
    }
}

fn render_task(out: &mut String, task: &TaskInfo) {
    let mut lines = Vec::new();

    if let Some(id) = &task.task_id {
        lines.push(format!("ID: {}", id));
    }
    if let Some(status) = &task.status {
        lines.push(format!("Status: {}", status));
    }
    if let Some(message) = &task.message {
        lines.push(format!("Message: {}", message));
    }
    if let Some(start) = &task.start_time {
        lines.push(format!("Started: {}", format_timestamp(start)));
    }
    if let Some(end) = &task.end_time {
        lines.push(format!("Ended: {}", format_timestamp(end)));
    }
    if let Some(duration) = task.duration.filter(|d| *d > 0.0) {
        lines.push(format!("Duration: {}", format_duration(duration)));
    }

    if !lines.is_empty() {
        out.push_str("\n\nTask:");
        for line in lines {
            out.push_str("\n  ");
            out.push_str(&line);
        }
    }
}

/// One-line form of the report, cut at [`SUMMARY_LIMIT`] characters.
pub fn summarize(err: &TaskError) -> String {
    let flat = render_error(err)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    truncate(&flat, SUMMARY_LIMIT)
}

/// Cut `text` to `limit` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Server timestamps shown in UTC; unparsable ones are shown as sent.
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed
            .with_timezone(&Utc)
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    raw.to_string()
}

/// Human duration from seconds.
///
/// ```rust
/// use taskwatch::report::format_duration;
///
/// assert_eq!(format_duration(45.0), "45 seconds");
/// assert_eq!(format_duration(125.0), "2m 5s");
/// assert_eq!(format_duration(3720.0), "1h 2m");
/// ```
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;

    if total < 60 {
        format!("{} seconds", total)
    } else if total < 3600 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}

/// Format bytes in human-readable form.
///
/// ```rust
/// use taskwatch::report::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
