//! Embedding extraction through a DeepFace-compatible REST service

use super::FaceError;
use crate::config::FaceSection;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    /// Embedding of the single most prominent face in `image`
    ///
    /// Returns [`FaceError::NoFaceDetected`] when no face is found.
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, FaceError>;
}

/// Decode a base64 image, accepting data URLs (`data:image/jpeg;base64,...`)
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, FaceError> {
    let payload = encoded.rsplit(',').next().unwrap_or(encoded).trim();
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| FaceError::InvalidImage(e.to_string()))?;
    if bytes.is_empty() {
        return Err(FaceError::InvalidImage("empty image".to_string()));
    }
    Ok(bytes)
}

#[derive(Serialize)]
struct RepresentRequest<'a> {
    img: String,
    model_name: &'a str,
    detector_backend: &'a str,
    enforce_detection: bool,
}

#[derive(Deserialize)]
struct RepresentResponse {
    #[serde(default)]
    results: Vec<RepresentResult>,
}

#[derive(Deserialize)]
struct RepresentResult {
    embedding: Vec<f32>,
}

/// Client for the DeepFace `/represent` endpoint
pub struct HttpFaceEmbedder {
    client: Client,
    service_url: String,
    model_name: String,
    detector_backend: String,
}

impl HttpFaceEmbedder {
    pub fn new(config: &FaceSection, timeout: Duration) -> Result<Self, FaceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaceError::Service(e.to_string()))?;
        Ok(Self {
            client,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            model_name: config.model_name.clone(),
            detector_backend: config.detector_backend.clone(),
        })
    }
}

#[async_trait]
impl FaceEmbedder for HttpFaceEmbedder {
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, FaceError> {
        let body = RepresentRequest {
            img: format!("data:image/jpeg;base64,{}", STANDARD.encode(image)),
            model_name: &self.model_name,
            detector_backend: &self.detector_backend,
            enforce_detection: true,
        };

        let response = self
            .client
            .post(format!("{}/represent", self.service_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| FaceError::Service(e.to_string()))?;

        let status = response.status();
        // DeepFace answers 400 when enforce_detection finds no face
        if status == reqwest::StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            debug!("Face service rejected image: {}", text);
            return Err(FaceError::NoFaceDetected);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FaceError::Service(format!("{status} - {text}")));
        }

        let parsed: RepresentResponse = response
            .json()
            .await
            .map_err(|e| FaceError::InvalidResponse(e.to_string()))?;

        parsed
            .results
            .into_iter()
            .next()
            .map(|result| result.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or(FaceError::NoFaceDetected)
    }
}
