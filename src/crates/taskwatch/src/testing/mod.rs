//! Test doubles for code built on the monitor.
//!
//! - [`ScriptedTransport`]: replays queued answers and records every request
//! - [`RecordingObserver`]: collects callbacks
//! - [`fixtures`]: envelope samples

use crate::error::{Result, TaskError};
use crate::monitor::TaskObserver;
use crate::task::{TaskHandle, TaskStatus};
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request seen by a [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub task_id: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Script {
    gets: VecDeque<Result<Value>>,
    posts: VecDeque<Result<Value>>,
    repeat_get: Option<Value>,
    requests: Vec<RecordedRequest>,
}

/// In-memory [`Transport`] answering from a queue.
///
/// Clones share the same script, so a test can keep one clone to inspect
/// requests after handing another to a monitor. An exhausted queue answers
/// with a transport error unless [`always_get`](Self::always_get) was set.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread poisons the lock; the script is still usable.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_get(&self, value: Value) -> &Self {
        self.script().gets.push_back(Ok(value));
        self
    }

    pub fn push_get_error(&self, err: TaskError) -> &Self {
        self.script().gets.push_back(Err(err));
        self
    }

    pub fn push_post(&self, value: Value) -> &Self {
        self.script().posts.push_back(Ok(value));
        self
    }

    pub fn push_post_error(&self, err: TaskError) -> &Self {
        self.script().posts.push_back(Err(err));
        self
    }

    /// Answer every GET with `value` once the queue is empty.
    pub fn always_get(&self, value: Value) -> &Self {
        self.script().repeat_get = Some(value);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script().requests.clone()
    }

    pub fn get_count(&self) -> usize {
        self.count(Method::Get)
    }

    pub fn post_count(&self) -> usize {
        self.count(Method::Post)
    }

    fn count(&self, method: Method) -> usize {
        self.script()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, task_id: Option<&TaskHandle>) -> Result<Value> {
        let mut script = self.script();
        script.requests.push(RecordedRequest {
            method: Method::Get,
            url: url.to_string(),
            task_id: task_id.map(|h| h.to_string()),
            body: None,
        });

        match script.gets.pop_front() {
            Some(answer) => answer,
            None => script
                .repeat_get
                .clone()
                .ok_or_else(|| TaskError::transport("no scripted GET answer left")),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let mut script = self.script();
        script.requests.push(RecordedRequest {
            method: Method::Post,
            url: url.to_string(),
            task_id: None,
            body: Some(body.clone()),
        });

        script
            .posts
            .pop_front()
            .unwrap_or_else(|| Err(TaskError::transport("no scripted POST answer left")))
    }
}

/// [`TaskObserver`] that keeps every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub completions: Vec<Value>,
    pub errors: Vec<TaskError>,
    pub no_prior_task: usize,
    pub launched: Vec<TaskHandle>,
    pub progress: Vec<(TaskStatus, u32)>,
}

impl TaskObserver for RecordingObserver {
    fn on_complete(&mut self, result: &Value) {
        self.completions.push(result.clone());
    }

    fn on_error(&mut self, error: &TaskError) {
        self.errors.push(error.clone());
    }

    fn on_no_prior_task(&mut self) {
        self.no_prior_task += 1;
    }

    fn on_launched(&mut self, handle: &TaskHandle) {
        self.launched.push(handle.clone());
    }

    fn on_progress(&mut self, status: TaskStatus, attempt: u32) {
        self.progress.push((status, attempt));
    }
}

/// Envelope samples.
pub mod fixtures {
    use serde_json::{json, Value};

    pub fn pending(task_id: &str) -> Value {
        json!({"status": "pending", "task_id": task_id, "message": "Tâche en attente"})
    }

    pub fn running(task_id: &str) -> Value {
        json!({"status": "running", "task_id": task_id, "message": "Tâche en cours"})
    }

    pub fn completed(task_id: &str, result: Value) -> Value {
        json!({"status": "completed", "task_id": task_id, "result": result})
    }

    pub fn failed(error: &str) -> Value {
        json!({"status": "failed", "error": error})
    }

    pub fn unknown(message: &str) -> Value {
        json!({"status": "unknown", "message": message})
    }
}
