//! Facial-recognition login
//!
//! Embeddings come from an external model service behind [`FaceEmbedder`].
//! The service's face detector doubles as the liveness check. Stored
//! embeddings are compared by Euclidean distance.

pub mod embedder;
pub mod matcher;
pub mod routes;
pub mod store;

pub use embedder::{decode_image, FaceEmbedder, HttpFaceEmbedder};
pub use matcher::{euclidean_distance, nearest_match};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("Invalid image data: {0}")]
    InvalidImage(String),
    #[error("Liveness check failed")]
    NoFaceDetected,
    #[error("Face service unavailable: {0}")]
    Service(String),
    #[error("Unexpected face service response: {0}")]
    InvalidResponse(String),
}
