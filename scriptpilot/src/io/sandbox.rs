//! Bounded child-process execution of extracted scripts.
//!
//! Each run gets a fresh temporary working directory, a cleared environment,
//! a wall-clock timeout and capped output capture. This is a supervision
//! contract, not a jail: scripts can still reach the network and any path the
//! invoking user can access.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::types::{ExecutionResult, ExtractedScript};
use crate::io::config::{InterpreterConfig, SandboxConfig};
use crate::io::process::run_command;

/// Guarantees the sandbox does not provide, printed by `scriptpilot limits`.
pub const LIMITATIONS: &str = "\
The script sandbox is a supervised child process, not an isolation boundary:
- network access is not restricted;
- the filesystem is not restricted beyond starting in an empty temporary directory;
- scripts run with the invoking user's privileges;
- processes that leave the script's process group (for example via setsid) are not killed;
- only the environment is scrubbed (PATH, HOME, TMPDIR, LANG and configured passthrough variables).";

/// Result of one sandbox invocation that did not fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    Completed(ExecutionResult),
    /// The cancel token fired; the process was killed and no result is reported.
    Cancelled,
}

/// Runs extracted scripts.
///
/// `Err` means the sandbox itself failed (interpreter missing, cannot spawn)
/// and is never used for a script that merely exits non-zero.
pub trait ScriptRunner {
    fn run(&self, script: &ExtractedScript, cancel: &CancelToken) -> Result<Execution>;
}

/// Subprocess sandbox driven by a configured interpreter.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: InterpreterConfig,
    config: SandboxConfig,
}

impl ProcessSandbox {
    pub fn new(interpreter: InterpreterConfig, config: SandboxConfig) -> Self {
        Self {
            interpreter,
            config,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn resolve_interpreter(&self) -> Result<PathBuf> {
        which::which(&self.interpreter.command)
            .with_context(|| format!("interpreter {:?} not found", self.interpreter.command))
    }
}

impl ScriptRunner for ProcessSandbox {
    #[instrument(skip_all, fields(language = %script.language_tag, timeout_secs = self.config.timeout_secs))]
    fn run(&self, script: &ExtractedScript, cancel: &CancelToken) -> Result<Execution> {
        let interpreter = self.resolve_interpreter()?;
        let workdir = tempfile::Builder::new()
            .prefix("scriptpilot-")
            .tempdir()
            .context("create sandbox directory")?;
        let script_path = workdir
            .path()
            .join(format!("script.{}", script_extension(&script.language_tag)));
        fs::write(&script_path, &script.body)
            .with_context(|| format!("write script {}", script_path.display()))?;

        let mut cmd = Command::new(&interpreter);
        cmd.args(&self.interpreter.args)
            .arg(&script_path)
            .current_dir(workdir.path())
            .env_clear()
            .env("PATH", &self.config.path)
            .env("HOME", workdir.path())
            .env("TMPDIR", workdir.path())
            .env("LANG", "C.UTF-8");
        for name in &self.config.env_passthrough {
            match std::env::var_os(name) {
                Some(value) => {
                    cmd.env(name, value);
                }
                None => debug!(name, "passthrough variable not set"),
            }
        }

        info!(interpreter = %interpreter.display(), "running script");
        let output = run_command(
            cmd,
            None,
            self.config.timeout(),
            self.config.output_limit_bytes,
            cancel,
        )
        .with_context(|| format!("run interpreter {}", interpreter.display()))?;

        if let Err(e) = workdir.close() {
            warn!(err = %e, "failed to remove sandbox directory");
        }

        if output.cancelled {
            return Ok(Execution::Cancelled);
        }
        let result = ExecutionResult {
            exit_code: output.exit_code(),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            duration: output.duration,
            timed_out: output.timed_out,
            stdout_truncated: output.stdout_truncated,
            stderr_truncated: output.stderr_truncated,
        };
        debug!(exit_code = ?result.exit_code, timed_out = result.timed_out, "script finished");
        Ok(Execution::Completed(result))
    }
}

/// File extension for a fence tag. Some interpreters (node, ruby) care about
/// it; unknown tags fall back to `txt`.
fn script_extension(language_tag: &str) -> &'static str {
    match language_tag {
        "python" | "py" | "python3" => "py",
        "sh" | "bash" | "shell" | "zsh" | "console" => "sh",
        "javascript" | "js" | "node" => "js",
        "typescript" | "ts" => "ts",
        "ruby" | "rb" => "rb",
        "perl" | "pl" => "pl",
        "lua" => "lua",
        "powershell" | "ps1" | "pwsh" => "ps1",
        _ => "txt",
    }
}
