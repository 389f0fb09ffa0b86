//! Launching and polling a server-side task.
//!
//! A [`TaskMonitor`] is bound to one task endpoint. It answers three
//! questions against that endpoint:
//!
//! - is there already a task for this resource ([`check_existing_status`]),
//! - start one ([`launch`]),
//! - wait for one to finish ([`poll`]).
//!
//! The check before launch fails open: anything that is not a clear answer
//! means "no prior task". Polling fails closed: anything that is not a clear
//! `pending`/`running`/`completed` ends the session with an error.
//!
//! [`check_existing_status`]: TaskMonitor::check_existing_status
//! [`launch`]: TaskMonitor::launch
//! [`poll`]: TaskMonitor::poll

use crate::config::PollConfig;
use crate::envelope::StandardizedResponse;
use crate::error::{Result, TaskError};
use crate::session::{PollSession, SessionState};
use crate::task::{TaskHandle, TaskInfo, TaskStatus};
use crate::transport::Transport;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

/// What a pre-launch status check found.
#[derive(Debug, Clone, PartialEq)]
pub enum ExistingStatus {
    /// A previous task finished; its result.
    Completed(Value),
    /// A previous task failed.
    Failed(TaskError),
    /// A task is still pending or running and can be polled.
    InFlight {
        handle: TaskHandle,
        status: TaskStatus,
    },
    /// Nothing usable: no task, `unknown`, an invalid answer or a network error.
    NoPriorTask,
}

/// Callbacks for the composed flows.
pub trait TaskObserver: Send {
    fn on_complete(&mut self, result: &Value);

    fn on_error(&mut self, error: &TaskError);

    fn on_no_prior_task(&mut self) {}

    fn on_launched(&mut self, _handle: &TaskHandle) {}

    /// Every non-terminal status answer with its attempt number. Attempt 0 is
    /// the pre-launch check that found the task in flight.
    fn on_progress(&mut self, _status: TaskStatus, _attempt: u32) {}
}

enum Step {
    InFlight(TaskStatus, TaskInfo),
    Done(Value),
}

/// Monitor for one task endpoint.
pub struct TaskMonitor<T> {
    transport: T,
    url: String,
    poll: PollConfig,
}

impl<T: Transport> TaskMonitor<T> {
    pub fn new(transport: T, url: impl Into<String>, poll: PollConfig) -> Self {
        Self {
            transport,
            url: url.into(),
            poll,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One `GET url` to find out whether a task already exists.
    ///
    /// Never fails: errors and unclear answers become
    /// [`ExistingStatus::NoPriorTask`].
    pub async fn check_existing_status(&self) -> ExistingStatus {
        debug!(url = %self.url, "Checking for an existing task");

        let value = match self.transport.get(&self.url, None).await {
            Ok(value) => value,
            Err(err) => {
                warn!(url = %self.url, error = %err, "Status check failed, assuming no prior task");
                return ExistingStatus::NoPriorTask;
            }
        };

        let envelope = match StandardizedResponse::from_value(value) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    url = %self.url,
                    error = %err,
                    "Status check answer unusable, assuming no prior task"
                );
                return ExistingStatus::NoPriorTask;
            }
        };

        match envelope.validate() {
            Ok(TaskStatus::Completed) => {
                info!(url = %self.url, task_id = ?envelope.task_id(), "Found completed task");
                ExistingStatus::Completed(envelope.result_value())
            }
            Ok(TaskStatus::Failed) => {
                let err = envelope.failure();
                info!(
                    url = %self.url,
                    task_id = ?envelope.task_id(),
                    error = %err,
                    "Found failed task"
                );
                ExistingStatus::Failed(err)
            }
            Ok(status @ (TaskStatus::Pending | TaskStatus::Running)) => match envelope.handle() {
                Some(handle) => {
                    info!(url = %self.url, task_id = %handle, %status, "Found task in flight");
                    ExistingStatus::InFlight { handle, status }
                }
                None => ExistingStatus::NoPriorTask,
            },
            Ok(TaskStatus::Unknown) => {
                debug!(url = %self.url, message = ?envelope.message, "No prior task");
                ExistingStatus::NoPriorTask
            }
            Err(err) => {
                warn!(
                    url = %self.url,
                    error = %err,
                    "Invalid status answer, assuming no prior task"
                );
                ExistingStatus::NoPriorTask
            }
        }
    }

    /// One `POST url` to start a task. `None` sends `{}`.
    ///
    /// Only a valid `pending` answer yields a handle.
    pub async fn launch(&self, body: Option<&Value>) -> Result<TaskHandle> {
        let empty = Value::Object(Map::new());
        let body = body.unwrap_or(&empty);

        debug!(url = %self.url, "Launching task");

        let result = self.launch_inner(body).await;
        match &result {
            Ok(handle) => info!(url = %self.url, task_id = %handle, "Task launched"),
            Err(err) => warn!(url = %self.url, kind = %err.kind(), error = %err, "Launch rejected"),
        }
        result
    }

    async fn launch_inner(&self, body: &Value) -> Result<TaskHandle> {
        let value = self.transport.post(&self.url, body).await?;
        let envelope = StandardizedResponse::from_value(value)?;

        match envelope.validate()? {
            TaskStatus::Pending => envelope.handle().ok_or_else(|| {
                TaskError::invalid_envelope("Missing task_id for status: pending")
            }),
            TaskStatus::Failed => Err(envelope.failure()),
            other => Err(TaskError::invalid_envelope(format!(
                "Unexpected launch status: {}",
                other
            ))
            .with_task(envelope.task_info())),
        }
    }

    /// Poll `handle` until it finishes, returning the completion result.
    pub async fn poll(&self, handle: &TaskHandle) -> Result<Value> {
        let mut session = PollSession::new();
        advance(&mut session, |s| s.begin_polling(handle.clone()));
        self.run_polling(&mut session, handle, &mut |_: TaskStatus, _: u32| {})
            .await
    }

    /// Poll `handle`, reporting progress and the outcome to `observer`.
    pub async fn poll_with<O>(&self, handle: &TaskHandle, observer: &mut O) -> PollSession
    where
        O: TaskObserver + ?Sized,
    {
        let mut session = PollSession::new();
        advance(&mut session, |s| s.begin_polling(handle.clone()));
        self.poll_session(&mut session, handle, observer).await;
        session
    }

    /// Page-load flow: check for an existing task and follow it.
    ///
    /// Returns the polling session when an in-flight task was found.
    pub async fn resume<O>(&self, observer: &mut O) -> Option<PollSession>
    where
        O: TaskObserver + ?Sized,
    {
        match self.check_existing_status().await {
            ExistingStatus::Completed(result) => {
                observer.on_complete(&result);
                None
            }
            ExistingStatus::Failed(err) => {
                observer.on_error(&err);
                None
            }
            ExistingStatus::NoPriorTask => {
                observer.on_no_prior_task();
                None
            }
            ExistingStatus::InFlight { handle, status } => {
                observer.on_progress(status, 0);
                Some(self.poll_with(&handle, observer).await)
            }
        }
    }

    /// Launch a task then poll it to the end.
    pub async fn launch_and_poll<O>(&self, body: Option<&Value>, observer: &mut O) -> PollSession
    where
        O: TaskObserver + ?Sized,
    {
        let mut session = PollSession::new();
        advance(&mut session, PollSession::begin_launch);

        let handle = match self.launch(body).await {
            Ok(handle) => handle,
            Err(err) => {
                advance(&mut session, |s| s.transition(SessionState::Failed));
                observer.on_error(&err);
                return session;
            }
        };

        observer.on_launched(&handle);
        advance(&mut session, |s| s.begin_polling(handle.clone()));
        self.poll_session(&mut session, &handle, observer).await;
        session
    }

    async fn poll_session<O>(
        &self,
        session: &mut PollSession,
        handle: &TaskHandle,
        observer: &mut O,
    ) where
        O: TaskObserver + ?Sized,
    {
        let outcome = self
            .run_polling(session, handle, &mut |status: TaskStatus, attempt: u32| {
                observer.on_progress(status, attempt)
            })
            .await;

        match &outcome {
            Ok(result) => observer.on_complete(result),
            Err(err) => observer.on_error(err),
        }
    }

    async fn run_polling(
        &self,
        session: &mut PollSession,
        handle: &TaskHandle,
        progress: &mut (dyn FnMut(TaskStatus, u32) + Send),
    ) -> Result<Value> {
        let outcome = loop {
            tokio::time::sleep(self.poll.interval).await;
            let attempt = session.record_attempt();

            match self.poll_once(handle, attempt).await {
                Ok(Step::Done(result)) => break Ok(result),
                Ok(Step::InFlight(status, info)) => {
                    progress(status, attempt);
                    if self.poll.budget_exhausted(attempt) {
                        break Err(TaskError::timeout(attempt).with_task(info));
                    }
                }
                Err(err) => break Err(err.or_task(TaskInfo::for_handle(handle))),
            }
        };

        match &outcome {
            Ok(_) => info!(task_id = %handle, attempts = session.attempts(), "Task completed"),
            Err(err) => warn!(
                task_id = %handle,
                attempts = session.attempts(),
                kind = %err.kind(),
                error = %err,
                "Polling stopped"
            ),
        }

        advance(session, |s| s.finish(&outcome));
        outcome
    }

    async fn poll_once(&self, handle: &TaskHandle, attempt: u32) -> Result<Step> {
        debug!(task_id = %handle, attempt, url = %self.url, "Polling task status");

        let value = self.transport.get(&self.url, Some(handle)).await?;
        let envelope = StandardizedResponse::from_value(value)?;
        let status = envelope.validate_for(handle)?;

        debug!(task_id = %handle, attempt, %status, "Status received");

        match status {
            TaskStatus::Completed => Ok(Step::Done(envelope.result_value())),
            TaskStatus::Failed => Err(envelope.failure()),
            TaskStatus::Unknown => Err(envelope.unknown()),
            TaskStatus::Pending | TaskStatus::Running => {
                let mut info = envelope.task_info();
                if info.task_id.is_none() {
                    info.task_id = Some(handle.to_string());
                }
                Ok(Step::InFlight(status, info))
            }
        }
    }
}

/// Apply a lifecycle step the monitor sequences itself.
fn advance<F, E>(session: &mut PollSession, step: F)
where
    F: FnOnce(&mut PollSession) -> std::result::Result<(), E>,
    E: std::fmt::Display,
{
    if let Err(err) = step(session) {
        error!(state = %session.state(), error = %err, "Session lifecycle violated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{RecordingObserver, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    fn monitor(transport: &ScriptedTransport, poll: PollConfig) -> TaskMonitor<ScriptedTransport> {
        TaskMonitor::new(transport.clone(), "/api/audit/", poll)
    }

    #[tokio::test]
    async fn test_check_existing_failed() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "failed", "error": "Fichier illisible"}));

        match monitor(&transport, PollConfig::analysis()).check_existing_status().await {
            ExistingStatus::Failed(err) => {
                assert_eq!(err.kind(), ErrorKind::TaskFailed);
                assert_eq!(err.message, "Fichier illisible");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_existing_in_flight_returns_handle() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "running", "task_id": "abc"}));

        let found = monitor(&transport, PollConfig::analysis()).check_existing_status().await;
        assert_eq!(
            found,
            ExistingStatus::InFlight {
                handle: TaskHandle::from("abc"),
                status: TaskStatus::Running
            }
        );
        assert_eq!(transport.requests()[0].task_id, None);
    }

    #[tokio::test]
    async fn test_check_existing_fails_open() {
        let transport = ScriptedTransport::new();
        transport.push_get_error(TaskError::transport("connection refused"));
        transport.push_get(json!({"status": "unknown", "message": "Aucune analyse"}));
        transport.push_get(json!("not an object"));

        let monitor = monitor(&transport, PollConfig::analysis());
        for _ in 0..3 {
            assert_eq!(monitor.check_existing_status().await, ExistingStatus::NoPriorTask);
        }
    }

    #[tokio::test]
    async fn test_launch_sends_empty_object_by_default() {
        let transport = ScriptedTransport::new();
        transport.push_post(json!({"status": "pending", "task_id": "t-1"}));

        let handle = monitor(&transport, PollConfig::analysis()).launch(None).await.unwrap();
        assert_eq!(handle.as_str(), "t-1");
        assert_eq!(transport.requests()[0].body, Some(json!({})));
    }

    #[tokio::test]
    async fn test_launch_accepts_legacy_message_id() {
        let transport = ScriptedTransport::new();
        transport.push_post(json!({
            "status": "pending",
            "message_id": 17,
            "message": "Audit lancé"
        }));

        let handle = monitor(&transport, PollConfig::analysis()).launch(None).await.unwrap();
        assert_eq!(handle.as_str(), "17");
    }

    #[tokio::test]
    async fn test_launch_rejects_other_statuses() {
        let transport = ScriptedTransport::new();
        transport.push_post(json!({"status": "completed", "task_id": "t", "result": {"x": 1}}));
        transport.push_post(json!({"status": "pending"}));

        let monitor = monitor(&transport, PollConfig::analysis());
        let err = monitor.launch(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEnvelope);
        assert!(err.message.contains("completed"));

        let err = monitor.launch(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEnvelope);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_waits_interval_before_each_request() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "pending", "task_id": "t"}));
        transport.push_get(json!({"status": "completed", "task_id": "t", "result": {"ok": true}}));

        let start = tokio::time::Instant::now();
        let result = monitor(&transport, PollConfig::analysis())
            .poll(&TaskHandle::from("t"))
            .await
            .unwrap();

        assert_eq!(result, json!({"ok": true}));
        assert!(start.elapsed() >= Duration::from_millis(4000));
        assert!(start.elapsed() < Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_transport_error_stops_immediately() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "running", "task_id": "t"}));
        transport.push_get_error(TaskError::transport("HTTP status 502"));
        transport.push_get(json!({"status": "completed", "task_id": "t", "result": 1}));

        let err = monitor(&transport, PollConfig::analysis())
            .poll(&TaskHandle::from("t"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.task.unwrap().task_id.as_deref(), Some("t"));
        assert_eq!(transport.get_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_unrecognized_status_fails_closed() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "error", "error": "legacy"}));

        let mut observer = RecordingObserver::default();
        let session = monitor(&transport, PollConfig::analysis())
            .poll_with(&TaskHandle::from("t"), &mut observer)
            .await;

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(observer.errors.len(), 1);
        assert_eq!(observer.errors[0].kind(), ErrorKind::InvalidEnvelope);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_with_reports_progress() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "pending", "task_id": "t"}));
        transport.push_get(json!({"status": "running", "task_id": "t"}));
        transport.push_get(json!({"status": "completed", "task_id": "t", "result": {"n": 1}}));

        let mut observer = RecordingObserver::default();
        let session = monitor(&transport, PollConfig::analysis())
            .poll_with(&TaskHandle::from("t"), &mut observer)
            .await;

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.attempts(), 3);
        assert_eq!(
            observer.progress,
            vec![(TaskStatus::Pending, 1), (TaskStatus::Running, 2)]
        );
        assert_eq!(observer.completions, vec![json!({"n": 1})]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_follows_in_flight_task() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "running", "task_id": "abc"}));
        transport.push_get(json!({"status": "completed", "task_id": "abc", "result": {"done": 1}}));

        let mut observer = RecordingObserver::default();
        let session = monitor(&transport, PollConfig::analysis())
            .resume(&mut observer)
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.handle().map(TaskHandle::as_str), Some("abc"));
        assert_eq!(observer.completions.len(), 1);

        let requests = transport.requests();
        assert_eq!(requests[0].task_id, None);
        assert_eq!(requests[1].task_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_resume_without_prior_task() {
        let transport = ScriptedTransport::new();
        transport.push_get(json!({"status": "unknown", "message": "Aucune tâche"}));

        let mut observer = RecordingObserver::default();
        let session = monitor(&transport, PollConfig::analysis()).resume(&mut observer).await;

        assert!(session.is_none());
        assert_eq!(observer.no_prior_task, 1);
        assert!(observer.completions.is_empty());
        assert!(observer.errors.is_empty());
    }
}
