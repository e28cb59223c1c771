//! OpenAI chat completions backend, used when `[llm] provider = "openai"`

use crate::llm::provider::{
    network_error, read_json, with_retries, CompletionRequest, CompletionResponse, FinishReason,
    LlmError, LlmProvider, MessageRole, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const VENDOR: &str = "OpenAI";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "OpenAI API key is required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn post_chat(&self, body: &ChatBody) -> Result<ChatReply, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| network_error(VENDOR, e))?;
        read_json(VENDOR, response, &[StatusCode::UNAUTHORIZED]).await
    }
}

fn chat_body(request: &CompletionRequest) -> ChatBody {
    ChatBody {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .map(|message| ChatMessage {
                role: match message.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: Some(message.content.clone()),
            })
            .collect(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Error,
    }
}

/// First choice of the reply; the request metadata is carried through
fn into_completion(
    reply: ChatReply,
    metadata: HashMap<String, String>,
) -> Result<CompletionResponse, LlmError> {
    let Some(choice) = reply.choices.into_iter().next() else {
        return Err(LlmError::InvalidResponse(
            "No choices returned from OpenAI".to_string(),
        ));
    };
    let usage = reply.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });
    Ok(CompletionResponse {
        content: choice.message.content,
        model: reply.model,
        usage,
        finish_reason: finish_reason(choice.finish_reason.as_deref()),
        metadata,
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = chat_body(&request);
        debug!(model = %body.model, messages = body.messages.len(), "OpenAI chat request");
        let reply = with_retries(VENDOR, || self.post_chat(&body)).await?;
        into_completion(reply, request.metadata)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| network_error(VENDOR, e))?;
        read_json::<serde_json::Value>(VENDOR, response, &[StatusCode::UNAUTHORIZED])
            .await
            .map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct ChatBody {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    model: String,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::Message;

    #[test]
    fn test_provider_requires_api_key() {
        let result = OpenAiProvider::new(OpenAiConfig::default());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_finish_reasons() {
        assert!(matches!(finish_reason(Some("stop")), FinishReason::Stop));
        assert!(matches!(finish_reason(Some("length")), FinishReason::Length));
        assert!(matches!(finish_reason(None), FinishReason::Error));
    }

    #[test]
    fn test_chat_body_skips_unset_fields() {
        let request = CompletionRequest {
            messages: vec![Message::system("Be brief."), Message::user("Weekly KPIs")],
            model: "gpt-4o-mini".to_string(),
            max_tokens: None,
            temperature: Some(0.7),
            metadata: HashMap::new(),
        };

        let json = serde_json::to_value(chat_body(&request)).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Weekly KPIs");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_reply_without_choices_is_invalid() {
        let reply: ChatReply =
            serde_json::from_value(serde_json::json!({"model": "gpt-4o-mini"})).unwrap();
        assert!(matches!(
            into_completion(reply, HashMap::new()),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
