//! Service configuration
//!
//! Configuration is a TOML file. Secrets are never written into it: each
//! secret is named by an `*_env` field and read from the environment when
//! it is needed.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub email: EmailSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub recommendation: RecommendationSection,
    #[serde(default)]
    pub face: FaceSection,
    #[serde(default)]
    pub orders: OrdersSection,
}

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the web client, used to build email links
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// Offset of the restaurant's local time from UTC, in minutes
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
            utc_offset_minutes: default_utc_offset_minutes(),
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_utc_offset_minutes() -> i32 {
    480 // Asia/Manila
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}

/// Database section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSection {
    /// SQLite database file; ":memory:" keeps everything in memory
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "restaurant.db".to_string()
}

/// Token signing section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    /// Environment variable containing the signing secret
    pub secret_key_env: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
    /// Lifetime of activation and password-reset links
    #[serde(default = "default_link_token_hours")]
    pub link_token_hours: i64,
}

fn default_access_token_minutes() -> i64 {
    5
}

fn default_refresh_token_days() -> i64 {
    1
}

fn default_link_token_hours() -> i64 {
    72
}

/// Email delivery backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailBackend {
    /// Write messages to the log
    #[default]
    Console,
    /// POST messages to a JSON email API
    Http,
}

/// Email section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailSection {
    #[serde(default)]
    pub backend: EmailBackend,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            backend: EmailBackend::Console,
            from_address: default_from_address(),
            api_url: None,
            api_key_env: None,
        }
    }
}

fn default_from_address() -> String {
    "no-reply@localhost".to_string()
}

/// LLM section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("gemini" or "openai")
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Override for the provider's API base URL
    pub base_url: Option<String>,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
}

/// Recommendation generator section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationSection {
    #[serde(default = "default_knowledge_base_path")]
    pub knowledge_base_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RecommendationSection {
    fn default() -> Self {
        Self {
            knowledge_base_path: default_knowledge_base_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

fn default_knowledge_base_path() -> PathBuf {
    PathBuf::from("data/knowledge_base.txt")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    2
}

/// Face-embedding service section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceSection {
    #[serde(default = "default_face_service_url")]
    pub service_url: String,
    #[serde(default = "default_face_model")]
    pub model_name: String,
    #[serde(default = "default_detector_backend")]
    pub detector_backend: String,
    /// Maximum Euclidean distance accepted as a match
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    #[serde(default = "default_face_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FaceSection {
    fn default() -> Self {
        Self {
            service_url: default_face_service_url(),
            model_name: default_face_model(),
            detector_backend: default_detector_backend(),
            match_threshold: default_match_threshold(),
            timeout_secs: default_face_timeout_secs(),
        }
    }
}

fn default_face_service_url() -> String {
    "http://localhost:5005".to_string()
}

fn default_face_model() -> String {
    "Facenet".to_string()
}

fn default_detector_backend() -> String {
    "opencv".to_string()
}

fn default_match_threshold() -> f32 {
    10.0
}

fn default_face_timeout_secs() -> u64 {
    30
}

/// Order maintenance section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrdersSection {
    /// Pending orders older than this are cancelled by `cancel-stale-orders`
    #[serde(default = "default_pending_timeout_minutes")]
    pub pending_timeout_minutes: i64,
}

impl Default for OrdersSection {
    fn default() -> Self {
        Self {
            pending_timeout_minutes: default_pending_timeout_minutes(),
        }
    }
}

fn default_pending_timeout_minutes() -> i64 {
    60
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.llm.provider.as_str(), "gemini" | "openai") {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider: {}",
                self.llm.provider
            )));
        }

        // chrono only accepts offsets strictly inside one day
        if self.server.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidConfig(format!(
                "utc_offset_minutes out of range: {}",
                self.server.utc_offset_minutes
            )));
        }

        if self.server.page_size == 0 || self.server.page_size > self.server.max_page_size {
            return Err(ConfigError::InvalidConfig(
                "page_size must be between 1 and max_page_size".to_string(),
            ));
        }

        if self.auth.access_token_minutes <= 0
            || self.auth.refresh_token_days <= 0
            || self.auth.link_token_hours <= 0
        {
            return Err(ConfigError::InvalidConfig(
                "token lifetimes must be positive".to_string(),
            ));
        }

        if self.recommendation.chunk_overlap >= self.recommendation.chunk_size {
            return Err(ConfigError::InvalidConfig(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }

        if self.email.backend == EmailBackend::Http && self.email.api_url.is_none() {
            return Err(ConfigError::InvalidConfig(
                "email backend \"http\" requires [email] api_url".to_string(),
            ));
        }

        if self.orders.pending_timeout_minutes <= 0 {
            return Err(ConfigError::InvalidConfig(
                "pending_timeout_minutes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the token signing secret from the environment
    pub fn get_jwt_secret(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.auth.secret_key_env)
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.llm.api_key_env)
    }

    /// Get the email API key, if one is configured
    pub fn get_email_api_key(&self) -> Option<String> {
        self.email
            .api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }

    /// The restaurant's local UTC offset
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.server.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Face-service request timeout
    pub fn face_timeout(&self) -> Duration {
        Duration::from_secs(self.face.timeout_secs)
    }

    /// Socket address string for the HTTP server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Create a configuration suitable for tests
    pub fn test_config() -> Self {
        let toml_content = r#"
[server]
frontend_url = "http://localhost:5173"
utc_offset_minutes = 480

[database]
path = ":memory:"

[auth]
secret_key_env = "RESTAURANT_TEST_SECRET"

[llm]
provider = "gemini"
model = "gemini-2.0-flash"
api_key_env = "GOOGLE_API_KEY"
"#;
        toml::from_str(toml_content).expect("test config should parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 9000
frontend_url = "https://order.example.com"
utc_offset_minutes = 480
page_size = 20
max_page_size = 50

[database]
path = "/var/lib/restaurant/pos.db"

[auth]
secret_key_env = "SECRET_KEY"
access_token_minutes = 15
refresh_token_days = 7

[email]
backend = "http"
from_address = "hello@example.com"
api_url = "https://mail.example.com/send"
api_key_env = "MAIL_API_KEY"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
temperature = 0.4

[recommendation]
knowledge_base_path = "kb/strategies.txt"
top_k = 3

[face]
service_url = "http://faces:5005"
match_threshold = 8.5

[orders]
pending_timeout_minutes = 30
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.page_size, 20);
        assert_eq!(config.auth.access_token_minutes, 15);
        assert_eq!(config.auth.link_token_hours, 72);
        assert_eq!(config.email.backend, EmailBackend::Http);
        assert_eq!(config.llm.temperature, Some(0.4));
        assert_eq!(config.recommendation.top_k, 3);
        assert_eq!(config.recommendation.chunk_size, 1000);
        assert_eq!(config.face.match_threshold, 8.5);
        assert_eq!(config.face.model_name, "Facenet");
        assert_eq!(config.orders.pending_timeout_minutes, 30);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::test_config();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.page_size, 10);
        assert_eq!(config.email.backend, EmailBackend::Console);
        assert_eq!(config.auth.access_token_minutes, 5);
        assert_eq!(config.auth.refresh_token_days, 1);
        assert_eq!(config.orders.pending_timeout_minutes, 60);
        assert_eq!(config.local_offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_unsupported_provider_rejected() {
        let toml_content = r#"
[auth]
secret_key_env = "SECRET_KEY"

[llm]
provider = "cohere"
model = "command"
api_key_env = "COHERE_API_KEY"
"#;
        let result = AppConfig::from_toml_str(toml_content);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_http_email_requires_url() {
        let toml_content = r#"
[auth]
secret_key_env = "SECRET_KEY"

[email]
backend = "http"

[llm]
provider = "gemini"
model = "gemini-2.0-flash"
api_key_env = "GOOGLE_API_KEY"
"#;
        let result = AppConfig::from_toml_str(toml_content);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::test_config();
        config.recommendation.chunk_overlap = config.recommendation.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_secret_env_var() {
        let mut config = AppConfig::test_config();
        config.auth.secret_key_env = "RESTAURANT_SECRET_THAT_IS_NOT_SET_ANYWHERE".to_string();
        assert!(matches!(
            config.get_jwt_secret(),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }
}
