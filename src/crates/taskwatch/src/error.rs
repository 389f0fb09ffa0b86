//! Error taxonomy for task launches and polling.
//!
//! Every failure the monitor reports is terminal for its session and carries
//! three pieces: a human-readable message, the structured details the server
//! supplied, and whatever task metadata is known.

use crate::task::TaskInfo;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use utils::UtilsError;

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Response missing the fields its stated status requires, or with an
    /// unrecognized status.
    InvalidEnvelope,
    /// Server explicitly reported `failed`.
    TaskFailed,
    /// Server reported `unknown`.
    TaskUnknown,
    /// Attempt budget exhausted while still pending or running.
    Timeout,
    /// Request did not complete, returned non-2xx, or was not JSON.
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidEnvelope => "invalid_envelope",
            ErrorKind::TaskFailed => "task_failed",
            ErrorKind::TaskUnknown => "task_unknown",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known detail fields, in display order. `traceback` goes last.
pub const DETAIL_FIELDS: &[&str] = &[
    "error",
    "detail",
    "message",
    "exception",
    "warning",
    "code",
    "status_code",
    "exception_type",
    "exception_message",
    "traceback",
];

/// Structured error fields echoed from the server.
///
/// Stored as the JSON object it arrived as so no field is lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorDetails(Map<String, Value>);

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. Objects are kept as-is; anything else lands under
    /// `detail`. `null` yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(map) => Some(Self(map)),
            other => {
                let mut map = Map::new();
                map.insert("detail".to_string(), other);
                Some(Self(map))
            }
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field rendered as text. Strings come back unquoted, `null`, `false`
    /// and empty strings are treated as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        value_text(self.0.get(key)?)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Render a JSON value as display text, treating empty-ish values as absent.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Terminal failure of a task session.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskInfo>,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            task: None,
        }
    }

    pub fn invalid_envelope(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEnvelope, message)
    }

    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TaskFailed, message)
    }

    pub fn task_unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TaskUnknown, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Budget of `attempts` polls spent while the task was still outstanding.
    pub fn timeout(attempts: u32) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Task still outstanding after {} status checks", attempts),
        )
        .with_details(ErrorDetails::new().with("attempts", attempts))
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = if details.is_empty() { None } else { Some(details) };
        self
    }

    /// Attach task metadata. Empty metadata is dropped.
    pub fn with_task(mut self, task: TaskInfo) -> Self {
        self.task = if task.is_empty() { None } else { Some(task) };
        self
    }

    /// Attach task metadata unless some is already present.
    pub fn or_task(self, task: TaskInfo) -> Self {
        if self.task.is_some() {
            self
        } else {
            self.with_task(task)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<UtilsError> for TaskError {
    fn from(err: UtilsError) -> Self {
        match err {
            UtilsError::HttpStatus { status, url, body } => {
                let mut details = ErrorDetails::new().with("status_code", status);
                if !body.trim().is_empty() {
                    details = details.with("detail", body);
                }
                TaskError::transport(format!("HTTP status {} from {}", status, url))
                    .with_details(details)
            }
            other => TaskError::transport(other.to_string()),
        }
    }
}

/// Invalid monitor or client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Load(#[from] UtilsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_is_message() {
        let err = TaskError::task_failed("bad file");
        assert_eq!(err.to_string(), "bad file");
        assert_eq!(err.kind(), ErrorKind::TaskFailed);
    }

    #[test]
    fn test_details_from_object_preserves_all_fields() {
        let details = ErrorDetails::from_value(json!({
            "error": "boom",
            "traceback": "line 1",
            "custom_field": {"nested": true}
        }))
        .unwrap();

        assert_eq!(details.text("error").as_deref(), Some("boom"));
        assert_eq!(details.text("traceback").as_deref(), Some("line 1"));
        assert_eq!(details.get("custom_field"), Some(&json!({"nested": true})));
    }

    #[test]
    fn test_details_from_scalar_lands_under_detail() {
        let details = ErrorDetails::from_value(json!("plain text")).unwrap();
        assert_eq!(details.text("detail").as_deref(), Some("plain text"));
        assert!(ErrorDetails::from_value(Value::Null).is_none());
    }

    #[test]
    fn test_details_text_rendering() {
        let details = ErrorDetails::new()
            .with("status_code", 503)
            .with("error", true)
            .with("warning", false)
            .with("message", "  ");

        assert_eq!(details.text("status_code").as_deref(), Some("503"));
        assert_eq!(details.text("error").as_deref(), Some("true"));
        assert_eq!(details.text("warning"), None);
        assert_eq!(details.text("message"), None);
        assert_eq!(details.text("missing"), None);
    }

    #[test]
    fn test_timeout_error_records_attempts() {
        let err = TaskError::timeout(60);
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.details.unwrap().get("attempts"), Some(&json!(60)));
    }

    #[test]
    fn test_empty_task_info_is_dropped() {
        let err = TaskError::transport("x").with_task(TaskInfo::default());
        assert!(err.task.is_none());
    }

    #[test]
    fn test_or_task_keeps_existing() {
        let first = TaskInfo {
            task_id: Some("a".into()),
            ..Default::default()
        };
        let second = TaskInfo {
            task_id: Some("b".into()),
            ..Default::default()
        };
        let err = TaskError::transport("x").with_task(first).or_task(second);
        assert_eq!(err.task.unwrap().task_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_http_status_maps_to_transport_with_details() {
        let err: TaskError = UtilsError::HttpStatus {
            status: 404,
            url: "http://h/audit/".to_string(),
            body: "{\"error\": \"Tâche non trouvée\"}".to_string(),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::Transport);
        let details = err.details.unwrap();
        assert_eq!(details.get("status_code"), Some(&json!(404)));
        assert!(details.text("detail").unwrap().contains("non trouvée"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidEnvelope).unwrap(),
            "\"invalid_envelope\""
        );
    }
}
