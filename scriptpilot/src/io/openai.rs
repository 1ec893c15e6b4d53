//! OpenAI-compatible chat completions backend (Groq, OpenAI, Ollama, ...).

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::types::{Role, Turn};
use crate::io::config::ProviderConfig;
use crate::io::provider::ModelProvider;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Blocking client for `{base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatibleProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "api key variable not set; sending requests without authorization"
            );
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn build_request(&self, conversation: &[Turn]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: to_chat_messages(conversation),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl ModelProvider for OpenAiCompatibleProvider {
    #[instrument(skip_all, fields(model = %self.model, turns = conversation.len()))]
    fn send(&self, conversation: &[Turn], cancel: &CancelToken) -> Result<String> {
        info!(endpoint = %self.endpoint, "requesting chat completion");
        let body = self.build_request(conversation);
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();

        // The blocking call runs on a worker so a cancel can abandon it.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = post_chat(&client, &endpoint, api_key.as_deref(), &body);
            // The receiver is gone when the request was abandoned.
            let _ = tx.send(result);
        });

        loop {
            if cancel.is_cancelled() {
                bail!("chat completion request cancelled");
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("chat completion worker exited without a result"));
                }
            }
        }
    }
}

fn post_chat(
    client: &Client,
    endpoint: &str,
    api_key: Option<&str>,
    body: &ChatRequest,
) -> Result<String> {
    let mut request = client.post(endpoint).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .with_context(|| format!("POST {endpoint}"))?;
    let status = response.status();
    let text = response.text().context("read response body")?;
    if !status.is_success() {
        bail!("{endpoint} returned {status}: {}", text.trim());
    }
    let reply = parse_reply(&text)?;
    debug!(reply_bytes = reply.len(), "chat completion received");
    Ok(reply)
}

/// Map turns onto chat roles. Tool turns carry no tool-call id, so they are
/// sent as user messages.
fn to_chat_messages(conversation: &[Turn]) -> Vec<ChatMessage> {
    conversation
        .iter()
        .map(|turn| ChatMessage {
            role: match turn.role {
                Role::Tool => Role::User.as_str(),
                role => role.as_str(),
            },
            content: turn.content.clone(),
        })
        .collect()
}

fn parse_reply(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("parse chat completion response")?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat completion response has no message content"))?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_turns_are_sent_as_user_messages() {
        let messages = to_chat_messages(&[
            Turn::system("intro"),
            Turn::user("q"),
            Turn::assistant("a"),
            Turn::tool("output"),
        ]);
        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "output");
    }

    #[test]
    fn parses_first_choice_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}}]}"#;
        assert_eq!(parse_reply(body).expect("reply"), "hi");
    }

    #[test]
    fn missing_content_is_an_error() {
        let err = parse_reply(r#"{"choices":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no message content"));
        assert!(parse_reply("not json").is_err());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let provider = OpenAiCompatibleProvider::from_config(&ProviderConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            api_key_env: "SCRIPTPILOT_TEST_UNSET_KEY".to_string(),
            ..ProviderConfig::default()
        })
        .expect("provider");
        assert_eq!(provider.endpoint, "http://localhost:11434/v1/chat/completions");
        assert!(provider.api_key.is_none());
        let request = provider.build_request(&[Turn::user("q")]);
        assert_eq!(request.model, "llama3-70b-8192");
        assert_eq!(request.max_tokens, 600);
    }

    #[test]
    fn cancelled_request_returns_promptly() {
        let provider = OpenAiCompatibleProvider::from_config(&ProviderConfig {
            // Non-routable address: the request would hang until the client timeout.
            base_url: "http://10.255.255.1:9".to_string(),
            api_key_env: "SCRIPTPILOT_TEST_UNSET_KEY".to_string(),
            ..ProviderConfig::default()
        })
        .expect("provider");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = provider.send(&[Turn::user("q")], &cancel).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
