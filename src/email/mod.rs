//! Transactional mail
//!
//! Account activation and password-reset links go out through a [`Mailer`].
//! The console backend only logs; the HTTP backend posts to a JSON email
//! API. Delivery failures are logged and counted but never fail the request
//! that triggered them.

pub mod templates;

use crate::config::{AppConfig, EmailBackend};
use crate::observability::metrics::metrics;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// A rendered message ready to send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email backend not configured: {0}")]
    NotConfigured(String),
    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Send and swallow the error, recording the outcome
pub async fn send_logged(mailer: &dyn Mailer, message: &EmailMessage) {
    match mailer.send(message).await {
        Ok(()) => metrics().email_sent(),
        Err(e) => {
            metrics().email_failed();
            warn!(to = %message.to, subject = %message.subject, "Error sending email: {}", e);
        }
    }
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default)]
pub struct ConsoleMailer {
    from_address: String,
}

impl ConsoleMailer {
    pub fn new<S: Into<String>>(from_address: S) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            from = %self.from_address,
            to = %message.to,
            subject = %message.subject,
            "Email (console backend)\n{}",
            message.html
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct HttpEmailPayload<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

/// Posts `{from, to, subject, html}` to a JSON email API
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from_address: String,
}

impl HttpMailer {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        from_address: String,
    ) -> Result<Self, EmailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EmailError::NotConfigured(e.to_string()))?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from_address,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let payload = HttpEmailPayload {
            from: &self.from_address,
            to: vec![message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        let mut request = self.client.post(&self.api_url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmailError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Delivery(format!("{status} - {body}")));
        }
        Ok(())
    }
}

/// Build the mailer selected by `[email] backend`
pub fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>, EmailError> {
    match config.email.backend {
        EmailBackend::Console => Ok(Arc::new(ConsoleMailer::new(
            config.email.from_address.clone(),
        ))),
        EmailBackend::Http => {
            let api_url = config.email.api_url.clone().ok_or_else(|| {
                EmailError::NotConfigured("email.api_url is required".to_string())
            })?;
            Ok(Arc::new(HttpMailer::new(
                api_url,
                config.get_email_api_key(),
                config.email.from_address.clone(),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "ana@example.com".to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_http_mailer_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer mail-key"))
            .and(body_partial_json(serde_json::json!({
                "from": "no-reply@luks.example",
                "to": ["ana@example.com"],
                "subject": "Hello"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            format!("{}/emails", server.uri()),
            Some("mail-key".to_string()),
            "no-reply@luks.example".to_string(),
        )
        .unwrap();
        mailer.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_mailer_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad address"))
            .mount(&server)
            .await;

        let mailer =
            HttpMailer::new(server.uri(), None, "no-reply@localhost".to_string()).unwrap();
        let err = mailer.send(&message()).await.unwrap_err();
        assert!(err.to_string().contains("bad address"));
    }

    #[tokio::test]
    async fn test_console_mailer_always_succeeds() {
        let mailer = ConsoleMailer::new("no-reply@localhost");
        assert!(mailer.send(&message()).await.is_ok());
    }
}
