//! Agent configuration stored in `scriptpilot.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "scriptpilot.toml";

/// Agent configuration (TOML).
///
/// Everything the controller needs is passed in explicitly from here; there is
/// no module-level state. Missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Ask before running each script.
    pub confirm_script: bool,

    /// Corrective resubmissions allowed per user turn.
    pub max_retries: u32,

    /// Trailing turns sent to the model with each request.
    pub history_offset: usize,

    pub interpreter: InterpreterConfig,
    pub sandbox: SandboxConfig,
    pub provider: ProviderConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Executable name (resolved on `PATH`) or absolute path.
    pub command: String,
    /// Arguments placed before the script path.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Wall-clock limit per script.
    pub timeout_secs: u64,
    /// Cap on captured stdout and on captured stderr, each.
    pub output_limit_bytes: usize,
    /// `PATH` given to scripts.
    pub path: String,
    /// Names of caller environment variables copied into the sandbox.
    pub env_passthrough: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions` endpoint.
    Openai,
    /// External command reading the conversation as JSON on stdin.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key. The key itself never lives in
    /// the config file.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Command line for `kind = "command"`.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Augment each user prompt with search results before the model call.
    pub enabled: bool,
    /// Command that receives the query as its last argument and prints a JSON
    /// array of `{title, url, text}`.
    pub command: Vec<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            output_limit_bytes: 100_000,
            path: "/usr/local/bin:/usr/bin:/bin".to_string(),
            env_passthrough: Vec::new(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Openai,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama3-70b-8192".to_string(),
            api_key_env: "SCRIPTPILOT_API_KEY".to_string(),
            max_tokens: 600,
            temperature: 0.2,
            timeout_secs: 30,
            command: Vec::new(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: Vec::new(),
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            confirm_script: false,
            max_retries: 3,
            history_offset: 20,
            interpreter: InterpreterConfig::default(),
            sandbox: SandboxConfig::default(),
            provider: ProviderConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_offset == 0 {
            return Err(anyhow!("history_offset must be > 0"));
        }
        if self.interpreter.command.trim().is_empty() {
            return Err(anyhow!("interpreter.command must be non-empty"));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(anyhow!("sandbox.timeout_secs must be > 0"));
        }
        if self.sandbox.output_limit_bytes == 0 {
            return Err(anyhow!("sandbox.output_limit_bytes must be > 0"));
        }
        if self.provider.timeout_secs == 0 {
            return Err(anyhow!("provider.timeout_secs must be > 0"));
        }
        match self.provider.kind {
            ProviderKind::Openai => {
                if self.provider.base_url.trim().is_empty() {
                    return Err(anyhow!("provider.base_url must be non-empty"));
                }
                if self.provider.model.trim().is_empty() {
                    return Err(anyhow!("provider.model must be non-empty"));
                }
            }
            ProviderKind::Command => {
                if !is_command(&self.provider.command) {
                    return Err(anyhow!(
                        "provider.command must be a non-empty array when provider.kind = \"command\""
                    ));
                }
            }
        }
        if self.search.enabled {
            if !is_command(&self.search.command) {
                return Err(anyhow!(
                    "search.command must be a non-empty array when search is enabled"
                ));
            }
            if self.search.timeout_secs == 0 {
                return Err(anyhow!("search.timeout_secs must be > 0"));
            }
        }
        Ok(())
    }
}

fn is_command(command: &[String]) -> bool {
    command.first().is_some_and(|program| !program.trim().is_empty())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
