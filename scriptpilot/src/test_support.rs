//! Test-only doubles for the model provider, sandbox and confirmation prompt.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::cancel::CancelToken;
use crate::core::gate::Confirmer;
use crate::core::types::{ExecutionResult, ExtractedScript, Turn};
use crate::io::provider::ModelProvider;
use crate::io::sandbox::{Execution, ScriptRunner};

/// One queued model response.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
    /// Fire the cancel token, then fail as an aborted request would.
    CancelThenFail,
}

/// Provider returning queued replies in order and recording every request.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: RefCell<VecDeque<ScriptedReply>>,
    requests: RefCell<Vec<Vec<Turn>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.borrow().clone()
    }
}

impl ModelProvider for ScriptedProvider {
    fn send(&self, conversation: &[Turn], cancel: &CancelToken) -> Result<String> {
        self.requests.borrow_mut().push(conversation.to_vec());
        match self.replies.borrow_mut().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            Some(ScriptedReply::CancelThenFail) => {
                cancel.cancel();
                Err(anyhow!("request cancelled"))
            }
            None => Err(anyhow!("scripted provider exhausted")),
        }
    }
}

/// One queued sandbox outcome.
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    Result(ExecutionResult),
    Fault(String),
    Cancel,
}

/// Sandbox returning queued outcomes and recording the scripts it was given.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    runs: RefCell<VecDeque<ScriptedRun>>,
    scripts: RefCell<Vec<ExtractedScript>>,
}

impl ScriptedRunner {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            scripts: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.scripts.borrow().len()
    }

    pub fn scripts(&self) -> Vec<ExtractedScript> {
        self.scripts.borrow().clone()
    }
}

impl ScriptRunner for ScriptedRunner {
    fn run(&self, script: &ExtractedScript, _cancel: &CancelToken) -> Result<Execution> {
        self.scripts.borrow_mut().push(script.clone());
        match self.runs.borrow_mut().pop_front() {
            Some(ScriptedRun::Result(result)) => Ok(Execution::Completed(result)),
            Some(ScriptedRun::Fault(message)) => Err(anyhow!(message)),
            Some(ScriptedRun::Cancel) => Ok(Execution::Cancelled),
            None => Err(anyhow!("scripted runner exhausted")),
        }
    }
}

/// Confirmer that always gives the same answer and counts how often it was asked.
#[derive(Debug)]
pub struct ScriptedConfirmer {
    answer: bool,
    asked: Cell<u32>,
}

impl ScriptedConfirmer {
    pub fn always(answer: bool) -> Self {
        Self {
            answer,
            asked: Cell::new(0),
        }
    }

    pub fn asked(&self) -> u32 {
        self.asked.get()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&mut self, _script: &ExtractedScript) -> bool {
        self.asked.set(self.asked.get() + 1);
        self.answer
    }
}

/// Exit-0 result with the given stdout.
pub fn succeeded(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration: Duration::from_millis(5),
        timed_out: false,
        stdout_truncated: 0,
        stderr_truncated: 0,
    }
}

/// Non-zero exit with the given stderr.
pub fn failed(exit_code: i32, stderr: &str) -> ExecutionResult {
    ExecutionResult {
        exit_code: Some(exit_code),
        stderr: stderr.to_string(),
        ..succeeded("")
    }
}

/// Killed on timeout.
pub fn timed_out() -> ExecutionResult {
    ExecutionResult {
        exit_code: None,
        timed_out: true,
        duration: Duration::from_secs(1),
        ..succeeded("")
    }
}
