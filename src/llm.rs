use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{LlmConfig, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.to_string()),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
        }
    }
}

/// Why a single model attempt produced no text.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    MalformedPayload(String),
}

impl AttemptError {
    /// Malformed payloads mean the remote answered but we could not read it;
    /// everything else just means "try the next model".
    pub fn is_fatal(&self) -> bool {
        matches!(self, AttemptError::MalformedPayload(_))
    }
}

/// Anything that can turn a model id plus a conversation into text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Whether a credential is configured. When false no attempt is made.
    fn has_credential(&self) -> bool;

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> std::result::Result<String, AttemptError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Longest slice of an error body kept for logs.
const ERROR_BODY_LIMIT: usize = 300;

pub struct LlmClient {
    client: reqwest::Client,
    timeout: Duration,
    api_key: Option<String>,
    endpoint: String,
    site_url: String,
    app_title: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig, server: &ServerConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            timeout,
            api_key: config.credential().map(str::to_string),
            endpoint: format!(
                "{}/chat/completions",
                config.effective_base_url().trim_end_matches('/')
            ),
            site_url: server.site_url.clone(),
            app_title: server.app_title.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn classify(&self, err: reqwest::Error) -> AttemptError {
        if err.is_timeout() {
            AttemptError::Timeout(self.timeout)
        } else {
            AttemptError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> std::result::Result<String, AttemptError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let request = ChatRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Sending request to {} for model {}", self.endpoint, model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.app_title)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        extract_content(&body)
    }
}

/// Pull `choices[0].message.content` out of a completions response body.
pub fn extract_content(body: &str) -> std::result::Result<String, AttemptError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AttemptError::MalformedPayload(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AttemptError::MalformedPayload("no choices[0].message.content".into()))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
