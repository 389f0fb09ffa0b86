//! Lifecycle of one launch-and-poll session.
//!
//! ```text
//! NotStarted -> Launching -> Polling -> Completed | Failed | TimedOut | Unknown
//! NotStarted -> Polling                 (in-flight task discovered)
//! Launching  -> Failed                  (launch rejected)
//! ```
//!
//! Terminal states are sinks.

use crate::error::{ErrorKind, TaskError};
use crate::task::TaskHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Launching,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Unknown,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not_started",
            SessionState::Launching => "launching",
            SessionState::Polling => "polling",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::TimedOut => "timed_out",
            SessionState::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed
                | SessionState::Failed
                | SessionState::TimedOut
                | SessionState::Unknown
        )
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (NotStarted, Launching) | (NotStarted, Polling) => true,
            (Launching, Polling) | (Launching, Failed) => true,
            (Polling, Completed) | (Polling, Failed) | (Polling, TimedOut) | (Polling, Unknown) => {
                true
            }
            _ => false,
        }
    }

    /// Terminal state a polling error ends in.
    pub fn for_error(error: &TaskError) -> SessionState {
        match error.kind() {
            ErrorKind::Timeout => SessionState::TimedOut,
            ErrorKind::TaskUnknown => SessionState::Unknown,
            ErrorKind::InvalidEnvelope | ErrorKind::TaskFailed | ErrorKind::Transport => {
                SessionState::Failed
            }
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid session transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// State of a single session plus the bookkeeping reports need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSession {
    state: SessionState,
    handle: Option<TaskHandle>,
    attempts: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PollSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state: SessionState::NotStarted,
            handle: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<&TaskHandle> {
        self.handle.as_ref()
    }

    /// Status requests sent so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn begin_launch(&mut self) -> Result<(), InvalidTransition> {
        self.transition(SessionState::Launching)
    }

    /// Start polling `handle`, from `NotStarted` or `Launching`.
    pub fn begin_polling(&mut self, handle: TaskHandle) -> Result<(), InvalidTransition> {
        self.transition(SessionState::Polling)?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Count one status request; returns the new total.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.updated_at = Utc::now();
        self.attempts
    }

    /// Enter the terminal state matching a polling outcome.
    pub fn finish<T>(&mut self, outcome: &Result<T, TaskError>) -> Result<(), InvalidTransition> {
        let next = match outcome {
            Ok(_) => SessionState::Completed,
            Err(err) => SessionState::for_error(err),
        };
        self.transition(next)
    }
}

impl Default for PollSession {
    fn default() -> Self {
        Self::new()
    }
}
