use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::db::Database;
use crate::email::Mailer;
use crate::face::FaceEmbedder;
use chrono::FixedOffset;
use std::sync::Arc;

/// Everything a request handler needs, cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub mailer: Arc<dyn Mailer>,
    pub face: Arc<dyn FaceEmbedder>,
}

impl AppState {
    pub fn new(
        db: Database,
        config: AppConfig,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        face: Arc<dyn FaceEmbedder>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            mailer,
            face,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.config.local_offset()
    }

    pub fn frontend_link(&self, route: &str, tail: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.server.frontend_url.trim_end_matches('/'),
            route,
            tail
        )
    }
}
