//! OpenAI-compatible chat completions backend.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::retry::{retry, RetryPolicy};
use super::{Ask, BackendError};
use crate::config::ChatApiConfig;

const MAX_ERROR_BODY_CHARS: usize = 256;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Sends the instruction as the system message and the input as the user message.
pub struct ChatApiBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
    policy: RetryPolicy,
}

impl ChatApiBackend {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, BackendError> {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key,
            policy,
        })
    }

    /// Read the API key from the environment variable named in `config`.
    pub fn from_config(config: &ChatApiConfig, policy: RetryPolicy) -> Result<Self, BackendError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| BackendError::MissingApiKey(config.api_key_env.clone()))?;

        tracing::info!(model = %config.model, base_url = %config.base_url, "Using chat API backend");
        Self::new(
            &config.base_url,
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
            policy,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, request: &ChatRequest<'_>) -> Result<String, BackendError> {
        let transport = |source| BackendError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().map_err(transport)?;
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: shorten_error_body(&body),
            });
        }
        Ok(body)
    }
}

impl Ask for ChatApiBackend {
    fn ask(&self, instruction: &str, input: &str) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
        };

        let body = retry(self.policy, BackendError::is_transient, || self.send(&request))?;
        let answer = parse_completion(&body)?;
        tracing::debug!(chars = answer.len(), "Chat API answered");
        Ok(answer)
    }
}

/// Extract `choices[0].message.content` from a completion body.
pub fn parse_completion(body: &str) -> Result<String, BackendError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::InvalidResponse(format!("not a chat completion: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::InvalidResponse("no choices in completion".into()))?
        .message
        .content
        .ok_or_else(|| BackendError::InvalidResponse("first choice has no content".into()))
}

/// Collapse whitespace and cap the length of an error body kept for display.
fn shorten_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_ERROR_BODY_CHARS {
        let mut shortened: String = collapsed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        shortened.push_str("...");
        shortened
    } else {
        collapsed
    }
}
