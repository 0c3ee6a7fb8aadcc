//! Completion backend — the opaque LLM dependency behind a trait seam.
//!
//! Every agent that needs text generation goes through
//! [`CompletionBackend`]; the production implementation talks to an
//! OpenAI-compatible chat-completions endpoint with bounded exponential
//! backoff over transient failures. Tests swap in a mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::config::CompletionEndpoint;

/// Which agent role issued the completion. Tagged into log events so a
/// slow or failing backend can be attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Analyzer,
    Synthesizer,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyzer => write!(f, "analyzer"),
            Self::Synthesizer => write!(f, "synthesizer"),
        }
    }
}

/// Completion backend failure classes.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Transient failure (timeout, rate limit, connection) — retried by
    /// the caller's backoff policy.
    #[error("transient completion failure: {0}")]
    Transient(String),
    /// Non-transient request failure (auth, schema, bad request).
    #[error("completion request failed: {0}")]
    Request(String),
    /// Backoff budget exhausted — fatal to the current call, routed to
    /// the loop as iteration-level degradation.
    #[error("completion backend unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },
}

/// The opaque completion dependency: `complete(role, system, prompt)`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        role: AgentRole,
        system: &str,
        prompt: &str,
    ) -> Result<String, CompletionError>;
}

/// Exponential backoff delay for retry attempt `attempt` (0-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt + 1))
}

/// Classify whether an HTTP-level error is worth retrying.
///
/// Rate limits and server-side failures are the transient classes the
/// backends must recognize; everything else is a permanent request
/// failure.
pub fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

// -- OpenAI-compatible chat completions wire types --

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Production backend against an OpenAI-compatible endpoint.
/// Temperature 0 — agent outputs feed deterministic gates.
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: CompletionEndpoint,
    max_attempts: u32,
}

impl OpenAiBackend {
    pub fn new(endpoint: CompletionEndpoint, timeout_secs: u64, max_attempts: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn attempt(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.endpoint.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.endpoint.url.trim_end_matches('/'));
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                CompletionError::Transient(e.to_string())
            } else {
                CompletionError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if is_transient_status(status) {
            return Err(CompletionError::Transient(format!("http {status}")));
        }
        if !status.is_success() {
            return Err(CompletionError::Request(format!("http {status}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Request(format!("malformed response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| CompletionError::Request("response contained no message".into()))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        role: AgentRole,
        system: &str,
        prompt: &str,
    ) -> Result<String, CompletionError> {
        let mut last_error = String::new();
        for attempt in 0..self.max_attempts {
            match self.attempt(system, prompt).await {
                Ok(text) => return Ok(text),
                Err(CompletionError::Transient(e)) => {
                    let backoff = backoff_delay(attempt);
                    warn!(
                        %role,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Transient completion error — retrying"
                    );
                    last_error = e;
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(CompletionError::Unavailable {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2), Duration::from_secs(8));
    }

    #[test]
    fn test_transient_status_classification() {
        assert!(is_transient_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(reqwest::StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(AgentRole::Analyzer.to_string(), "analyzer");
        assert_eq!(AgentRole::Synthesizer.to_string(), "synthesizer");
    }

    #[tokio::test]
    async fn test_mock_backend_roundtrip() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .returning(|_, _, _| Ok("{\"assertions\": []}".to_string()));
        let out = backend
            .complete(AgentRole::Analyzer, "system", "prompt")
            .await
            .unwrap();
        assert!(out.contains("assertions"));
    }
}
