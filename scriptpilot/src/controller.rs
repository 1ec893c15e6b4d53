//! Feedback loop that drives one user turn from prompt to terminal outcome.
//!
//! Per turn the controller walks an explicit state machine:
//!
//! ```text
//! AwaitingModelResponse -> Extracting -> Confirming -> Executing
//!          ^                                              |
//!          +------------- corrective prompt --------------+
//! ```
//!
//! Only a failed execution loops back, and only `max_retries` times. Every
//! other path ends the turn with a [`TurnOutcome`].

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::extract::extract_script;
use crate::core::gate::{ConfirmationGate, Confirmer, GateState};
use crate::core::history::Conversation;
use crate::core::types::{AgentState, ExecutionResult, ExtractedScript, Turn, TurnOutcome};
use crate::io::config::AgentConfig;
use crate::io::prompt::PromptEngine;
use crate::io::provider::ModelProvider;
use crate::io::sandbox::{Execution, ScriptRunner};

/// Construction-time settings for [`AgentController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub confirm_script: bool,
    pub max_retries: u32,
    pub history_offset: usize,
    /// Interpreter named in the intro prompt.
    pub interpreter: String,
}

impl From<&AgentConfig> for ControllerSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            confirm_script: config.confirm_script,
            max_retries: config.max_retries,
            history_offset: config.history_offset,
            interpreter: config.interpreter.command.clone(),
        }
    }
}

/// Progress notifications emitted while a turn is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent<'a> {
    /// Raw text returned by the model.
    ModelReply { text: &'a str },
    /// A script was extracted and is about to pass the confirmation gate.
    ScriptProposed { script: &'a ExtractedScript },
    /// The sandbox finished a run (successful or not).
    ExecutionFinished { result: &'a ExecutionResult },
    /// A corrective prompt is being sent.
    Retrying { attempt: u32, max_retries: u32 },
}

enum LoopState {
    AwaitingModelResponse,
    Extracting(String),
    Confirming(ExtractedScript),
    Executing(ExtractedScript),
}

/// Owns the conversation and per-turn state for one interactive session.
pub struct AgentController<P, R> {
    provider: P,
    runner: R,
    gate: ConfirmationGate,
    prompts: PromptEngine,
    intro: Turn,
    history_offset: usize,
    conversation: Conversation,
    state: AgentState,
    cancel: CancelToken,
}

impl<P: ModelProvider, R: ScriptRunner> AgentController<P, R> {
    pub fn new(
        provider: P,
        runner: R,
        settings: &ControllerSettings,
        cancel: CancelToken,
    ) -> Result<Self> {
        let prompts = PromptEngine::new();
        let intro = prompts
            .render_intro(&settings.interpreter)
            .context("render intro prompt")?;
        Ok(Self {
            provider,
            runner,
            gate: ConfirmationGate::new(settings.confirm_script),
            prompts,
            intro: Turn::system(intro),
            history_offset: settings.history_offset,
            conversation: Conversation::new(),
            state: AgentState::new(settings.max_retries),
            cancel,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Process one user input to completion, including any retries.
    ///
    /// `Err` is reserved for internal failures (prompt rendering); every
    /// provider, sandbox and script problem is reported as a [`TurnOutcome`].
    #[instrument(skip_all, fields(history = self.conversation.len()))]
    pub fn run_turn<C, F>(
        &mut self,
        input: &str,
        confirmer: &mut C,
        mut on_event: F,
    ) -> Result<TurnOutcome>
    where
        C: Confirmer + ?Sized,
        F: FnMut(&TurnEvent<'_>),
    {
        self.state.reset();
        self.cancel.reset();
        self.conversation.push(Turn::user(input));

        let mut loop_state = LoopState::AwaitingModelResponse;
        loop {
            loop_state = match loop_state {
                LoopState::AwaitingModelResponse => {
                    if self.cancel.is_cancelled() {
                        return Ok(self.cancelled());
                    }
                    let request = self
                        .conversation
                        .request(Some(&self.intro), self.history_offset);
                    debug!(turns = request.len(), "sending conversation to model");
                    let reply = self.provider.send(&request, &self.cancel);
                    if self.cancel.is_cancelled() {
                        return Ok(self.cancelled());
                    }
                    match reply {
                        Ok(text) => {
                            on_event(&TurnEvent::ModelReply { text: &text });
                            LoopState::Extracting(text)
                        }
                        Err(err) => {
                            warn!(err = %format!("{err:#}"), "provider failure");
                            return Ok(TurnOutcome::ProviderFailure {
                                message: format!("{err:#}"),
                            });
                        }
                    }
                }
                LoopState::Extracting(text) => {
                    let script = extract_script(&text);
                    self.conversation.push(Turn::assistant(text.as_str()));
                    match script {
                        Some(script) => {
                            debug!(language = %script.language_tag, "script extracted");
                            LoopState::Confirming(script)
                        }
                        None => {
                            info!("model answered without a script");
                            return Ok(TurnOutcome::Answered {
                                text,
                                executed: false,
                            });
                        }
                    }
                }
                LoopState::Confirming(script) => {
                    on_event(&TurnEvent::ScriptProposed { script: &script });
                    self.state.awaiting_confirmation = self.gate.requires_confirmation();
                    let decision = self.gate.decide(&script, confirmer);
                    self.state.awaiting_confirmation = false;
                    if self.cancel.is_cancelled() {
                        return Ok(self.cancelled());
                    }
                    match decision {
                        GateState::Approved => LoopState::Executing(script),
                        _ => {
                            info!("script rejected by user");
                            return Ok(TurnOutcome::UserRejected);
                        }
                    }
                }
                LoopState::Executing(script) => {
                    let result = match self.runner.run(&script, &self.cancel) {
                        Ok(Execution::Completed(result)) => result,
                        Ok(Execution::Cancelled) => return Ok(self.cancelled()),
                        Err(err) => {
                            warn!(err = %format!("{err:#}"), "sandbox fault");
                            return Ok(TurnOutcome::SandboxFault {
                                message: format!("{err:#}"),
                            });
                        }
                    };
                    on_event(&TurnEvent::ExecutionFinished { result: &result });

                    if result.succeeded() {
                        info!("script succeeded");
                        self.conversation.push(Turn::tool(result.stdout.as_str()));
                        return Ok(TurnOutcome::Answered {
                            text: result.stdout,
                            executed: true,
                        });
                    }

                    if !self.state.try_retry() {
                        warn!(retries = self.state.retry_count, "retry limit reached");
                        let outcome = TurnOutcome::RetryLimitExceeded {
                            retries: self.state.retry_count,
                            last_failure: result,
                        };
                        // Later turns should see why the task was abandoned.
                        self.conversation.push(Turn::tool(outcome.to_string()));
                        return Ok(outcome);
                    }
                    let attempt = self.state.retry_count;
                    let max_retries = self.state.max_retries;
                    info!(attempt, max_retries, status = %result.status_line(), "script failed, retrying");
                    let corrective = self
                        .prompts
                        .render_corrective(&script, &result, attempt, max_retries)
                        .context("render corrective prompt")?;
                    self.conversation.push(Turn::tool(corrective));
                    on_event(&TurnEvent::Retrying {
                        attempt,
                        max_retries,
                    });
                    LoopState::AwaitingModelResponse
                }
            };
        }
    }

    fn cancelled(&self) -> TurnOutcome {
        info!("turn cancelled by user");
        TurnOutcome::Cancelled
    }
}
