//! Model-agnostic request/response types and the provider trait
//!
//! The recommendation generator talks to a hosted model through
//! [`LlmProvider`], so the backend (Gemini or OpenAI) is chosen by
//! configuration and tests can substitute a mock.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Message roles in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One prompt for the model, plus metadata echoed back in the response
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub metadata: HashMap<String, String>,
}

/// LLM completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
    pub metadata: HashMap<String, String>,
}

/// Token counts reported by the vendor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// A hosted model the recommendation job can call
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "gemini", "openai")
    fn name(&self) -> &str;

    /// Generate a completion from the given request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Check if the provider is configured and ready
    async fn health_check(&self) -> Result<(), LlmError>;
}

/// LLM provider errors
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
}

impl LlmError {
    /// Network failures and 5xx responses are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::NetworkError(_) | LlmError::RateLimitExceeded(_) => true,
            LlmError::ApiError(msg) => msg.contains("server error"),
            _ => false,
        }
    }
}

/// Backoff schedule shared by the HTTP providers
pub(crate) const RETRY_BACKOFF_MS: [u64; 3] = [100, 200, 300];

/// Run `call`, repeating it after each backoff step while it fails with a
/// retryable error
pub(crate) async fn with_retries<T, F, Fut>(vendor: &'static str, mut call: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut delays = RETRY_BACKOFF_MS.iter();
    let mut attempt = 1;
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => err,
            Err(err) => return Err(err),
        };
        let Some(&delay_ms) = delays.next() else {
            error!(vendor, attempts = attempt, "LLM request failed after all retries");
            return Err(err);
        };
        warn!(vendor, attempt, delay_ms, error = %err, "LLM request failed, retrying");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}

pub(crate) fn network_error(vendor: &'static str, err: reqwest::Error) -> LlmError {
    warn!(
        vendor,
        is_connect = err.is_connect(),
        is_timeout = err.is_timeout(),
        "LLM network error: {}",
        err
    );
    LlmError::NetworkError(err.to_string())
}

/// Decode a vendor response, classifying failures by status. `key_rejected`
/// lists the statuses a vendor uses for a bad API key.
pub(crate) async fn read_json<T: DeserializeOwned>(
    vendor: &'static str,
    response: reqwest::Response,
    key_rejected: &[StatusCode],
) -> Result<T, LlmError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()));
    }
    if key_rejected.contains(&status) {
        return Err(LlmError::AuthenticationFailed(format!(
            "{vendor} rejected the API key"
        )));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimitExceeded(format!(
            "{vendor} rate limit reached"
        )));
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(LlmError::ApiError(format!(
            "{vendor} API server error: {status} - {body}"
        )));
    }
    error!(vendor, %status, %body, "LLM API client error");
    Err(LlmError::ApiError(format!(
        "{vendor} API error: {status} - {body}"
    )))
}
