//! The standardized response envelope shared by launch and status endpoints.
//!
//! ```json
//! {"status": "running", "task_id": "abc", "message": "Audit en cours..."}
//! ```
//!
//! Field values are read leniently: ids may arrive as numbers, and empty
//! strings count as absent.

use crate::error::{value_text, ErrorDetails, Result, TaskError};
use crate::task::{TaskHandle, TaskInfo, TaskStatus};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Envelope returned by task endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardizedResponse {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Older launch endpoints name the id `message_id`.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Everything else the server sent (`start_time`, `duration`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_text))
}

/// Falsy in the sense the front-end used: null, false, 0 and "".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl StandardizedResponse {
    /// Decode a JSON answer into an envelope.
    ///
    /// Anything but a JSON object is an invalid envelope.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(TaskError::invalid_envelope(format!(
                "Invalid response format: expected a JSON object, got {}",
                value
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| TaskError::invalid_envelope(format!("Invalid response format: {}", e)))
    }

    /// Task id, from `task_id` or the legacy `message_id`.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref().or(self.message_id.as_deref())
    }

    pub fn handle(&self) -> Option<TaskHandle> {
        self.task_id().map(TaskHandle::from)
    }

    pub fn has_result(&self) -> bool {
        self.result.as_ref().map(is_truthy).unwrap_or(false)
    }

    /// The completion payload, `null` when the server sent none.
    pub fn result_value(&self) -> Value {
        self.result.clone().unwrap_or(Value::Null)
    }

    /// Check the envelope invariants and return its status.
    pub fn validate(&self) -> Result<TaskStatus> {
        self.check(false)
    }

    /// Like [`validate`](Self::validate), for a status answer about a handle
    /// the client already holds.
    ///
    /// The handle stands in for a missing `task_id` on `pending` and
    /// `running` only. An answer naming another task is invalid.
    pub fn validate_for(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        if let Some(reported) = self.task_id() {
            if reported != handle.as_str() {
                return Err(TaskError::invalid_envelope(format!(
                    "Status answer names a different task: expected {}, got {}",
                    handle, reported
                ))
                .with_task(self.task_info()));
            }
        }
        self.check(true)
    }

    fn check(&self, handle_known: bool) -> Result<TaskStatus> {
        let invalid = |message: String| {
            TaskError::invalid_envelope(message).with_task(self.task_info())
        };

        let raw = self
            .status
            .as_deref()
            .ok_or_else(|| invalid("Invalid response format: missing status".to_string()))?;

        let status: TaskStatus = raw
            .parse()
            .map_err(|_| invalid(format!("Unrecognized task status: {}", raw)))?;

        let has_id = self.task_id().is_some();

        match status {
            TaskStatus::Pending | TaskStatus::Running if !has_id && !handle_known => Err(
                invalid(format!("Missing task_id for status: {}", status)),
            ),
            TaskStatus::Completed if !has_id && !self.has_result() => Err(invalid(
                "Missing task_id or result for status: completed".to_string(),
            )),
            TaskStatus::Failed if self.error.is_none() && self.message.is_none() => Err(invalid(
                "Missing error message for status: failed".to_string(),
            )),
            TaskStatus::Unknown if self.message.is_none() => Err(invalid(
                "Missing message for status: unknown".to_string(),
            )),
            _ => Ok(status),
        }
    }

    /// Task metadata carried by this envelope.
    pub fn task_info(&self) -> TaskInfo {
        let extra_text = |key: &str| self.extra.get(key).and_then(value_text);

        TaskInfo {
            task_id: self.task_id().map(str::to_string),
            status: self.status.clone(),
            message: self.message.clone(),
            start_time: extra_text("start_time"),
            end_time: extra_text("end_time"),
            duration: self.extra.get("duration").and_then(Value::as_f64),
        }
    }

    /// Error for a `failed` envelope.
    ///
    /// The message is `error`, else `message`. An object `result` becomes the
    /// details and, when it names one, its `error`, `detail` or `message`
    /// field becomes the message.
    pub fn failure(&self) -> TaskError {
        let mut message = self
            .error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Task failed".to_string());

        let mut details = None;
        if let Some(result @ Value::Object(_)) = &self.result {
            if let Some(found) = ErrorDetails::from_value(result.clone()) {
                if let Some(text) = ["error", "detail", "message"]
                    .iter()
                    .find_map(|key| found.text(key))
                {
                    message = text;
                }
                details = Some(found);
            }
        }

        let mut err = TaskError::task_failed(message).with_task(self.task_info());
        if let Some(details) = details {
            err = err.with_details(details);
        }
        err
    }

    /// Error for an `unknown` envelope.
    pub fn unknown(&self) -> TaskError {
        TaskError::task_unknown(
            self.message
                .clone()
                .unwrap_or_else(|| "Unknown task status".to_string()),
        )
        .with_task(self.task_info())
    }
}
