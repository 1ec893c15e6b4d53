//! Model provider abstraction.
//!
//! The [`ModelProvider`] trait decouples the feedback loop from the concrete
//! backend. Which backend to use is decided once, at construction time, from
//! [`ProviderConfig`]. Tests use scripted providers that return predetermined
//! replies without touching the network.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::types::Turn;
use crate::io::config::{ProviderConfig, ProviderKind};
use crate::io::openai::OpenAiCompatibleProvider;
use crate::io::process::run_command;

/// Cap on a command provider's reply.
const COMMAND_REPLY_LIMIT_BYTES: usize = 1_000_000;

/// Abstraction over language-model backends.
pub trait ModelProvider {
    /// Send the conversation and return the model's reply text.
    ///
    /// Implementations should return promptly once `cancel` fires; the
    /// controller discards whatever they return in that case.
    fn send(&self, conversation: &[Turn], cancel: &CancelToken) -> Result<String>;
}

impl<P: ModelProvider + ?Sized> ModelProvider for Box<P> {
    fn send(&self, conversation: &[Turn], cancel: &CancelToken) -> Result<String> {
        (**self).send(conversation, cancel)
    }
}

/// Build the provider selected by config.
pub fn provider_from_config(config: &ProviderConfig) -> Result<Box<dyn ModelProvider>> {
    match config.kind {
        ProviderKind::Openai => Ok(Box::new(OpenAiCompatibleProvider::from_config(config)?)),
        ProviderKind::Command => Ok(Box::new(CommandProvider::new(
            config.command.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
    }
}

/// Provider that shells out to a local command.
///
/// The conversation is written to stdin as JSON (`{"messages": [...]}`) and
/// the trimmed stdout is the reply.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct CommandPayload<'a> {
    messages: &'a [Turn],
}

impl CommandProvider {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| anyhow!("provider command must be non-empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

impl ModelProvider for CommandProvider {
    #[instrument(skip_all, fields(program = %self.program, turns = conversation.len()))]
    fn send(&self, conversation: &[Turn], cancel: &CancelToken) -> Result<String> {
        info!("invoking command provider");
        let payload = serde_json::to_vec(&CommandPayload {
            messages: conversation,
        })
        .context("serialize conversation")?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        let output = run_command(
            cmd,
            Some(payload),
            self.timeout,
            COMMAND_REPLY_LIMIT_BYTES,
            cancel,
        )
        .with_context(|| format!("run provider command {}", self.program))?;

        if output.cancelled {
            bail!("provider command cancelled");
        }
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "provider command timed out");
            bail!("provider command timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            let stderr = output.stderr_lossy();
            bail!(
                "provider command failed with status {:?}: {}",
                output.status.code(),
                stderr.trim()
            );
        }
        let reply = output.stdout_lossy().trim().to_string();
        if reply.is_empty() {
            bail!("provider command returned an empty reply");
        }
        debug!(reply_bytes = reply.len(), "provider replied");
        Ok(reply)
    }
}
