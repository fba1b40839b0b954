//! Client for an OpenAI-compatible chat completion endpoint.

use async_trait::async_trait;
use atelier_config::CompletionSettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion service is not configured")]
    NotConfigured,
    #[error("Completion request failed: {0}")]
    Transport(String),
    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Completion service error {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("Unexpected completion response: {0}")]
    UnexpectedShape(String),
}

/// Pluggable completion backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<Completion, CompletionError>;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
}

pub struct HttpCompletionClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl HttpCompletionClient {
    pub fn new(settings: &CompletionSettings) -> Result<Self, CompletionError> {
        if settings.endpoint.trim().is_empty() {
            return Err(CompletionError::NotConfigured);
        }

        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", settings.endpoint.trim_end_matches('/')),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            model: settings.model.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<Completion, CompletionError> {
        let mut request = self.client.post(&self.url).json(&CompletionRequest {
            model: &self.model,
            messages,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = %self.model, messages = messages.len(), "Requesting completion");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.timeout)
            } else {
                CompletionError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.timeout)
            } else {
                CompletionError::Transport(e.to_string())
            }
        })?;

        let result = parse_completion(status.as_u16(), &body);
        if let Err(e) = &result {
            warn!(status = status.as_u16(), error = %e, "Completion failed");
        }
        result
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Interprets a completion response body. Anything other than a first
/// choice carrying string content is a failure; the service's own
/// `error.message` is surfaced when present.
pub fn parse_completion(status: u16, body: &str) -> Result<Completion, CompletionError> {
    let json: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let upstream_message = json
        .as_ref()
        .and_then(|j| j.pointer("/error/message"))
        .and_then(|m| m.as_str())
        .map(str::to_string);

    if !(200..300).contains(&status) {
        return Err(CompletionError::Upstream {
            status,
            message: upstream_message.unwrap_or_else(|| "AI error".to_string()),
        });
    }

    let Some(json) = json else {
        return Err(CompletionError::UnexpectedShape("body is not JSON".to_string()));
    };

    let message = json.pointer("/choices/0/message");
    let text = message
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str());

    match text {
        Some(text) => Ok(Completion {
            text: text.to_string(),
            confidence_score: message.and_then(|m| {
                m.get("confidenceScore")
                    .or_else(|| m.get("confidence_score"))
                    .and_then(|c| c.as_f64())
            }),
        }),
        None => match upstream_message {
            Some(message) => Err(CompletionError::Upstream { status, message }),
            None => Err(CompletionError::UnexpectedShape(
                "missing choices[0].message.content".to_string(),
            )),
        },
    }
}
