//! Optional web-search augmentation, applied before the model call.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cancel::CancelToken;
use crate::io::config::SearchConfig;
use crate::io::process::run_command;

const SEARCH_OUTPUT_LIMIT_BYTES: usize = 2_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub text: String,
}

pub trait SearchProvider {
    /// Ordered results for `query`, best first.
    fn search(&self, query: &str, cancel: &CancelToken) -> Result<Vec<SearchResult>>;
}

/// Search backend that runs an external command with the query as its last
/// argument and parses a JSON array from stdout.
#[derive(Debug, Clone)]
pub struct CommandSearch {
    program: String,
    args: Vec<String>,
    max_results: usize,
    timeout: Duration,
}

impl CommandSearch {
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("search.command must be non-empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            max_results: config.max_results,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

impl SearchProvider for CommandSearch {
    #[instrument(skip_all, fields(program = %self.program))]
    fn search(&self, query: &str, cancel: &CancelToken) -> Result<Vec<SearchResult>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(query);
        let output = run_command(
            cmd,
            None,
            self.timeout,
            SEARCH_OUTPUT_LIMIT_BYTES,
            cancel,
        )
        .with_context(|| format!("run search command {}", self.program))?;
        if output.cancelled {
            bail!("search cancelled");
        }
        if output.timed_out {
            bail!("search timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            bail!(
                "search command failed with status {:?}: {}",
                output.status.code(),
                output.stderr_lossy().trim()
            );
        }
        let mut results: Vec<SearchResult> =
            serde_json::from_slice(&output.stdout).context("parse search results")?;
        results.truncate(self.max_results);
        debug!(results = results.len(), "search finished");
        Ok(results)
    }
}

/// Append search results to the user prompt, preserving result order.
pub fn augment_prompt(prompt: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return prompt.to_string();
    }
    let formatted: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "Result {}: {} - {}\n\nBody: {}",
                i + 1,
                result.title,
                result.url,
                result.text
            )
        })
        .collect();
    format!(
        "{prompt}\n\n## Web Search Results are:\n\n{}",
        formatted.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            text: format!("{title} body"),
        }
    }

    #[test]
    fn augment_keeps_result_order() {
        let prompt = augment_prompt("what is rust", &[result("a"), result("b")]);
        assert!(prompt.starts_with("what is rust\n\n## Web Search Results are:"));
        let a = prompt.find("Result 1: a - https://example.com/a").expect("a");
        let b = prompt.find("Result 2: b - https://example.com/b").expect("b");
        assert!(a < b);
        assert!(prompt.contains("Body: b body"));
    }

    #[test]
    fn no_results_leaves_prompt_untouched() {
        assert_eq!(augment_prompt("hi", &[]), "hi");
    }

    #[cfg(unix)]
    #[test]
    fn command_search_parses_and_truncates() {
        let search = CommandSearch::from_config(&SearchConfig {
            enabled: true,
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                r#"echo "[{\"title\":\"$0\",\"url\":\"u1\"},{\"title\":\"t2\",\"url\":\"u2\",\"text\":\"x\"}]""#
                    .to_string(),
            ],
            max_results: 1,
            timeout_secs: 5,
        })
        .expect("search");
        let results = search.search("query", &CancelToken::new()).expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "query");
        assert_eq!(results[0].text, "");
    }
}
