//! Prompt rendering for the intro and corrective messages.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::{ExecutionResult, ExtractedScript};

const INTRO_TEMPLATE: &str = include_str!("prompts/intro.md");
const CORRECTIVE_TEMPLATE: &str = include_str!("prompts/corrective.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("intro", INTRO_TEMPLATE)
            .expect("intro template should be valid");
        env.add_template("corrective", CORRECTIVE_TEMPLATE)
            .expect("corrective template should be valid");
        Self { env }
    }

    /// System prompt describing the fenced-block convention and where scripts run.
    pub fn render_intro(&self, interpreter: &str) -> Result<String> {
        let template = self.env.get_template("intro")?;
        let rendered = template.render(context! {
            interpreter => interpreter,
            language => language_hint(interpreter),
            os => std::env::consts::OS,
        })?;
        Ok(rendered)
    }

    /// Resubmission prompt embedding a failed run and the script that produced it.
    pub fn render_corrective(
        &self,
        script: &ExtractedScript,
        result: &ExecutionResult,
        attempt: u32,
        max_retries: u32,
    ) -> Result<String> {
        let mut notices = Vec::new();
        if result.stdout_truncated > 0 {
            notices.push(format!(
                "[stdout truncated {} bytes]",
                result.stdout_truncated
            ));
        }
        if result.stderr_truncated > 0 {
            notices.push(format!(
                "[stderr truncated {} bytes]",
                result.stderr_truncated
            ));
        }
        let template = self.env.get_template("corrective")?;
        let rendered = template.render(context! {
            status => result.status_line(),
            attempt => attempt,
            max_retries => max_retries,
            language_tag => script.language_tag.as_str(),
            script => script.body.trim_end(),
            stdout => result.stdout.trim_end(),
            stderr => result.stderr.trim_end(),
            timed_out => result.timed_out,
            notices => notices,
        })?;
        Ok(rendered)
    }
}

/// Fence tag suggested to the model for a given interpreter command.
fn language_hint(interpreter: &str) -> &str {
    let name = interpreter
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(interpreter)
        .trim_end_matches(".exe");
    match name {
        n if n.starts_with("python") => "python",
        "sh" | "bash" | "zsh" | "dash" => "bash",
        "node" | "nodejs" => "javascript",
        "pwsh" | "powershell" => "powershell",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failure() -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(1),
            stdout: "partial\n".to_string(),
            stderr: "NameError: name 'x' is not defined\n".to_string(),
            duration: Duration::from_millis(20),
            timed_out: false,
            stdout_truncated: 0,
            stderr_truncated: 12,
        }
    }

    fn script() -> ExtractedScript {
        ExtractedScript {
            language_tag: "python".to_string(),
            body: "print(x)\n".to_string(),
        }
    }

    #[test]
    fn intro_names_interpreter_and_fence() {
        let intro = PromptEngine::new()
            .render_intro("/usr/bin/python3")
            .expect("render");
        assert!(intro.contains("```python"));
        assert!(intro.contains("`/usr/bin/python3`"));
    }

    #[test]
    fn corrective_embeds_script_and_output() {
        let prompt = PromptEngine::new()
            .render_corrective(&script(), &failure(), 1, 2)
            .expect("render");
        assert!(prompt.contains("exit code 1"));
        assert!(prompt.contains("retry 1 of 2"));
        assert!(prompt.contains("print(x)"));
        assert!(prompt.contains("partial"));
        assert!(prompt.contains("NameError"));
        assert!(prompt.contains("[stderr truncated 12 bytes]"));
        assert!(!prompt.contains("time limit"));
    }

    #[test]
    fn corrective_mentions_timeout() {
        let mut result = failure();
        result.exit_code = None;
        result.timed_out = true;
        result.stdout.clear();
        let prompt = PromptEngine::new()
            .render_corrective(&script(), &result, 2, 2)
            .expect("render");
        assert!(prompt.contains("timed out"));
        assert!(prompt.contains("time limit"));
        assert!(!prompt.contains("Standard output"));
    }

    #[test]
    fn language_hint_from_interpreter_name() {
        assert_eq!(language_hint("python3"), "python");
        assert_eq!(language_hint("/bin/bash"), "bash");
        assert_eq!(language_hint("node"), "javascript");
        assert_eq!(language_hint("ruby"), "ruby");
    }
}
