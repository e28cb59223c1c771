//! Service error type and its HTTP mapping
//!
//! Every handler and store function returns [`AppResult`]. The variants map
//! onto the response shapes the web client expects: `{"error": ...}` for
//! business-rule refusals, `{"detail": ...}` for auth failures and a
//! field-keyed map for validation problems.

use crate::config::ConfigError;
use crate::email::EmailError;
use crate::face::FaceError;
use crate::llm::provider::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use warp::http::StatusCode;

/// Field name to list of messages, as rendered for validation failures
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Main error type for the restaurant service
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    #[error("{message}")]
    AuthenticationFailed { message: String, code: String },

    #[error("Given token not valid for any token type")]
    InvalidToken,

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid page.")]
    InvalidPage,

    #[error("Not found.")]
    MissingObject,

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("Face service error: {0}")]
    Face(#[from] FaceError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl warp::reject::Reject for AppError {}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl AppError {
    /// Create a 400 error rendered as `{"error": message}`
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a 404 error rendered as `{"error": message}`
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a 409 error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a 403 error rendered as `{"error": message}`
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a 401 authentication failure with a machine-readable code
    pub fn authentication_failed<S: Into<String>, C: Into<String>>(message: S, code: C) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Single-field validation failure
    pub fn field<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        Self::Validation(errors)
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated
            | AppError::AuthenticationFailed { .. }
            | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::InvalidPage | AppError::MissingObject => {
                StatusCode::NOT_FOUND
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Llm(_)
            | AppError::Face(_)
            | AppError::Email(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for this error
    pub fn to_body(&self) -> Value {
        match self {
            AppError::BadRequest(message)
            | AppError::Forbidden(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message) => json!({ "error": message }),
            AppError::Validation(errors) => json!(errors),
            AppError::Unauthenticated => json!({
                "detail": self.to_string(),
                "code": "not_authenticated",
            }),
            AppError::AuthenticationFailed { message, code } => json!({
                "detail": message,
                "code": code,
            }),
            AppError::InvalidToken => json!({
                "detail": self.to_string(),
                "code": "token_not_valid",
            }),
            AppError::PermissionDenied | AppError::InvalidPage | AppError::MissingObject => {
                json!({ "detail": self.to_string() })
            }
            _ => json!({ "error": sanitize_error_message(&self.to_string()) }),
        }
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static regex")
});

static CREDENTIAL_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("static regex")
});

/// Sanitize error messages before they leave the process
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();
    sanitized = CREDENTIAL_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for service operations
pub type AppResult<T> = Result<T, AppError>;
