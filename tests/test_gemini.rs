//! Integration tests for the Gemini provider against a mock endpoint

use restaurant_pos::llm::provider::{CompletionRequest, FinishReason, LlmError, LlmProvider, Message};
use restaurant_pos::llm::providers::gemini::{GeminiConfig, GeminiProvider};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-2.0-flash:generateContent";

fn test_config(base_url: &str) -> GeminiConfig {
    GeminiConfig {
        api_key: "test-google-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn test_request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![Message::user("Weekly KPIs: revenue below target.")],
        model: "gemini-2.0-flash".to_string(),
        max_tokens: Some(2048),
        temperature: Some(0.7),
        metadata: HashMap::new(),
    }
}

fn candidate_body(parts: &[&str]) -> serde_json::Value {
    let parts: Vec<_> = parts.iter().map(|text| serde_json::json!({"text": text})).collect();
    serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": parts},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 80, "totalTokenCount": 200},
        "modelVersion": "gemini-2.0-flash-001"
    })
}

#[tokio::test]
async fn test_gemini_returns_joined_candidate_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-google-key"))
        .and(body_partial_json(serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": "Weekly KPIs: revenue below target."}]}],
            "generationConfig": {"maxOutputTokens": 2048}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate_body(&["## Weekly Business Insights\n", "Run a lunch promo."])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = GeminiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request()).await.unwrap();

    assert_eq!(
        response.content.as_deref(),
        Some("## Weekly Business Insights\nRun a lunch promo.")
    );
    assert_eq!(response.model, "gemini-2.0-flash-001");
    assert_eq!(response.usage.total_tokens, 200);
    assert!(matches!(response.finish_reason, FinishReason::Stop));
}

#[tokio::test]
async fn test_gemini_retries_transient_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("model overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(&["Second try."])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = GeminiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request()).await.unwrap();
    assert_eq!(response.content.as_deref(), Some("Second try."));
}

#[tokio::test]
async fn test_gemini_rejected_key_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": 403, "message": "API key not valid.", "status": "PERMISSION_DENIED"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = GeminiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_gemini_bad_request_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid argument"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = GeminiProvider::new(test_config(&mock_server.uri())).unwrap();
    let err = provider.complete(test_request()).await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("400"));
}

#[tokio::test]
async fn test_gemini_blocked_prompt_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&mock_server)
        .await;

    let provider = GeminiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}
