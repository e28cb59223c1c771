//! Mock implementations for testing
//!
//! Stand-ins for the three outside services (hosted LLM, face-embedding
//! service and mail relay) so handlers and jobs run without a network.

use crate::email::{EmailError, EmailMessage, Mailer};
use crate::face::{FaceEmbedder, FaceError};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock LLM provider that replays canned answers and records requests
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub should_fail: bool,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        if self.should_fail {
            return Err(LlmError::ApiError("Mock API server error: 503".to_string()));
        }

        let mut current = self.current_response.lock().await;
        let response_idx = *current % self.responses.len().max(1);
        *current += 1;

        let content = self
            .responses
            .get(response_idx)
            .cloned()
            .unwrap_or_else(|| "Mock response".to_string());

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Face embedder keyed by the raw image bytes. Unknown images behave like
/// a photo with no face in it.
#[derive(Debug, Default)]
pub struct MockFaceEmbedder {
    faces: std::sync::Mutex<HashMap<Vec<u8>, Vec<f32>>>,
    unavailable: bool,
}

impl MockFaceEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embedder whose every call fails as if the service were down
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn with_face(self, image: &[u8], embedding: Vec<f32>) -> Self {
        if let Ok(mut faces) = self.faces.lock() {
            faces.insert(image.to_vec(), embedding);
        }
        self
    }
}

#[async_trait]
impl FaceEmbedder for MockFaceEmbedder {
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, FaceError> {
        if self.unavailable {
            return Err(FaceError::Service("mock face service is down".to_string()));
        }
        let faces = self
            .faces
            .lock()
            .map_err(|_| FaceError::Service("mock lock poisoned".to_string()))?;
        faces.get(image).cloned().ok_or(FaceError::NoFaceDetected)
    }
}

/// Mailer that keeps every message instead of sending it
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<EmailMessage>>>,
    pub should_fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if self.should_fail {
            return Err(EmailError::Delivery("mock relay refused".to_string()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::Message;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("Weekly KPIs")],
            model: "mock-model".to_string(),
            max_tokens: None,
            temperature: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_llm_cycles_responses() {
        let provider = MockLlmProvider::new(vec!["one".to_string(), "two".to_string()]);
        let first = provider.complete(request()).await.unwrap();
        let second = provider.complete(request()).await.unwrap();
        let third = provider.complete(request()).await.unwrap();
        assert_eq!(first.content.as_deref(), Some("one"));
        assert_eq!(second.content.as_deref(), Some("two"));
        assert_eq!(third.content.as_deref(), Some("one"));
        assert_eq!(provider.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_mock_llm_failure_is_retryable() {
        let provider = MockLlmProvider::with_failure();
        let err = provider.complete(request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(provider.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_face_embedder() {
        let embedder = MockFaceEmbedder::new().with_face(b"alice", vec![0.1, 0.2]);
        assert_eq!(embedder.embed(b"alice").await.unwrap(), vec![0.1, 0.2]);
        assert!(matches!(
            embedder.embed(b"blank wall").await,
            Err(FaceError::NoFaceDetected)
        ));
        assert!(matches!(
            MockFaceEmbedder::unavailable().embed(b"alice").await,
            Err(FaceError::Service(_))
        ));
    }

    #[tokio::test]
    async fn test_recording_mailer() {
        let mailer = RecordingMailer::new();
        let message = EmailMessage {
            to: "cook@example.com".to_string(),
            subject: "Welcome".to_string(),
            html: "<p>Hi</p>".to_string(),
        };
        mailer.send(&message).await.unwrap();
        assert_eq!(mailer.sent().await, vec![message.clone()]);
        assert!(RecordingMailer::with_failure().send(&message).await.is_err());
    }
}
