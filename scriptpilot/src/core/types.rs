//! Shared types for the feedback loop.
//!
//! These types carry no I/O. Turns and execution results are immutable once
//! produced; `AgentState` is the only value the controller mutates while a
//! user turn is in flight.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Intro prompt placed ahead of the history on every request.
    System,
    User,
    Assistant,
    /// Script output and corrective prompts produced by the loop itself.
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One message in conversation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

/// Script located inside a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedScript {
    /// Lower-cased fence tag; empty when the fence carried none.
    pub language_tag: String,
    pub body: String,
}

/// Outcome of one sandbox invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `None` when the process was killed on timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
    /// Bytes of stdout discarded beyond the output limit.
    pub stdout_truncated: usize,
    /// Bytes of stderr discarded beyond the output limit.
    pub stderr_truncated: usize,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Short human-readable status, e.g. `exit code 1` or `timed out after 5s`.
    pub fn status_line(&self) -> String {
        if self.timed_out {
            return format!("timed out after {:.1}s", self.duration.as_secs_f64());
        }
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Per-turn bookkeeping owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentState {
    pub retry_count: u32,
    pub max_retries: u32,
    pub awaiting_confirmation: bool,
}

impl AgentState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            retry_count: 0,
            max_retries,
            awaiting_confirmation: false,
        }
    }

    /// Clear per-turn counters ahead of a new user input.
    pub fn reset(&mut self) {
        self.retry_count = 0;
        self.awaiting_confirmation = false;
    }

    /// Consume one retry. Returns `false` (and leaves the counter untouched)
    /// once the budget is spent.
    pub fn try_retry(&mut self) -> bool {
        if self.retry_count >= self.max_retries {
            return false;
        }
        self.retry_count += 1;
        true
    }
}

/// Terminal outcome of one user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Plain answer from the model, or stdout of a successful script.
    Answered { text: String, executed: bool },
    /// The user declined to run the proposed script.
    UserRejected,
    /// Every retry failed; carries the last failing execution.
    RetryLimitExceeded {
        retries: u32,
        last_failure: ExecutionResult,
    },
    /// The sandbox itself could not run (interpreter missing, spawn failure).
    SandboxFault { message: String },
    /// The model provider returned an error.
    ProviderFailure { message: String },
    /// Interrupted by the user while waiting on the model or a script.
    Cancelled,
}

impl TurnOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Answered { .. } => "answered",
            TurnOutcome::UserRejected => "user_rejected",
            TurnOutcome::RetryLimitExceeded { .. } => "retry_limit_exceeded",
            TurnOutcome::SandboxFault { .. } => "sandbox_fault",
            TurnOutcome::ProviderFailure { .. } => "provider_failure",
            TurnOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnOutcome::Answered { text, .. } => f.write_str(text),
            TurnOutcome::UserRejected => f.write_str("script rejected; nothing was executed"),
            TurnOutcome::RetryLimitExceeded {
                retries,
                last_failure,
            } => {
                write!(
                    f,
                    "giving up after {retries} retries; last attempt failed with {}",
                    last_failure.status_line()
                )?;
                let stderr = last_failure.stderr.trim();
                if !stderr.is_empty() {
                    write!(f, "\n{stderr}")?;
                }
                Ok(())
            }
            TurnOutcome::SandboxFault { message } => write!(f, "sandbox fault: {message}"),
            TurnOutcome::ProviderFailure { message } => write!(f, "provider failure: {message}"),
            TurnOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}
