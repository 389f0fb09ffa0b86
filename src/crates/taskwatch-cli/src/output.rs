//! Outcome of a command and how it is printed.

use crate::cli::OutputFormat;
use serde::Serialize;
use serde_json::Value;
use std::process::ExitCode;
use taskwatch::report::{render_error, summarize};
use taskwatch::{
    AuditReport, ExistingStatus, PollSession, TaskError, TaskHandle, TaskObserver, TaskStatus,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
        result: Value,
    },
    Failed {
        error: TaskError,
    },
    InFlight {
        task_id: String,
        status: TaskStatus,
    },
    Launched {
        task_id: String,
    },
    NoPriorTask,
}

impl Outcome {
    pub fn from_existing(found: ExistingStatus) -> Self {
        match found {
            ExistingStatus::Completed(result) => Outcome::Completed {
                task_id: None,
                result,
            },
            ExistingStatus::Failed(error) => Outcome::Failed { error },
            ExistingStatus::InFlight { handle, status } => Outcome::InFlight {
                task_id: handle.to_string(),
                status,
            },
            ExistingStatus::NoPriorTask => Outcome::NoPriorTask,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed { .. })
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"outcome\": \"failed\", \"error\": \"{}\"}}", e)),
            OutputFormat::Text => self.render_text(),
        }
    }

    fn render_text(&self) -> String {
        match self {
            Outcome::Completed { result, .. } => render_result(result),
            Outcome::Failed { error } => {
                format!("Task failed ({})\n{}", error.kind(), render_error(error))
            }
            Outcome::InFlight { task_id, status } => format!("Task {} is {}", task_id, status),
            Outcome::Launched { task_id } => task_id.clone(),
            Outcome::NoPriorTask => "No prior task".to_string(),
        }
    }

    /// Write to stdout, or stderr for failures in text mode.
    pub fn print(&self, format: OutputFormat) {
        let text = self.render(format);
        match (self, format) {
            (Outcome::Failed { .. }, OutputFormat::Text) => eprintln!("{}", text),
            _ => println!("{}", text),
        }
    }
}

/// Audit results get their table view; anything else is shown as JSON.
fn render_result(result: &Value) -> String {
    if result.get("results").is_some() {
        if let Ok(report) = AuditReport::from_result(result) {
            return report.render();
        }
    }
    serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
}

/// Collects the outcome of the observer-driven flows.
#[derive(Debug, Default)]
pub struct CliObserver {
    pub outcome: Option<Outcome>,
    pub no_prior_task: bool,
    handle: Option<TaskHandle>,
}

impl CliObserver {
    /// Final outcome, falling back to the session when no callback fired.
    pub fn finish(self, session: Option<&PollSession>) -> Outcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        match session.and_then(PollSession::handle) {
            Some(handle) => Outcome::InFlight {
                task_id: handle.to_string(),
                status: TaskStatus::Running,
            },
            None => Outcome::NoPriorTask,
        }
    }
}

impl TaskObserver for CliObserver {
    fn on_complete(&mut self, result: &Value) {
        self.outcome = Some(Outcome::Completed {
            task_id: self.handle.as_ref().map(TaskHandle::to_string),
            result: result.clone(),
        });
    }

    fn on_error(&mut self, error: &TaskError) {
        self.outcome = Some(Outcome::Failed {
            error: error.clone(),
        });
        info!(summary = %summarize(error), "Task ended with an error");
    }

    fn on_no_prior_task(&mut self) {
        self.no_prior_task = true;
    }

    fn on_launched(&mut self, handle: &TaskHandle) {
        self.handle = Some(handle.clone());
    }

    fn on_progress(&mut self, status: TaskStatus, attempt: u32) {
        info!(%status, attempt, "Task in progress");
    }
}
