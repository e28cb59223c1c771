//! Testing utilities and mock implementations
//!
//! Fixtures that build a fully wired [`AppState`] over an in-memory database
//! with mocked outside services, used by unit and integration tests alike.

pub mod mocks;

pub use mocks::*;

use crate::auth::{hash_password, TokenService};
use crate::config::AppConfig;
use crate::db::Database;
use crate::email::Mailer;
use crate::error::AppResult;
use crate::face::FaceEmbedder;
use crate::http::AppState;
use crate::users::{store, NewUser, Role, User};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub const TEST_SECRET: &[u8] = b"restaurant-test-secret";

pub fn test_tokens() -> TokenService {
    TokenService::new(
        TEST_SECRET,
        Duration::minutes(60),
        Duration::days(1),
        Duration::hours(24),
    )
}

/// State with a recording mailer and an embedder that knows no faces
pub fn test_state() -> AppState {
    test_state_with(Arc::new(RecordingMailer::new()), Arc::new(MockFaceEmbedder::new()))
}

pub fn test_state_with(mailer: Arc<dyn Mailer>, face: Arc<dyn FaceEmbedder>) -> AppState {
    let db = Database::in_memory().expect("in-memory database");
    AppState::new(db, AppConfig::test_config(), test_tokens(), mailer, face)
}

/// Insert an active account with the given role
pub fn create_user(db: &Database, email: &str, password: &str, role: Role) -> AppResult<User> {
    let password_hash = hash_password(password)?;
    db.write(|tx| {
        store::insert_user(
            tx,
            &NewUser {
                email: email.to_string(),
                password_hash,
                first_name: "Test".to_string(),
                last_name: role.as_str().to_string(),
                role,
                is_active: true,
                agreed_to_terms_at: Some(Utc::now()),
            },
            Utc::now(),
        )
    })
}

/// `Authorization` header value for `user`
pub fn bearer(state: &AppState, user: &User) -> String {
    match state.tokens.issue_access(user) {
        Ok(token) => format!("Bearer {token}"),
        Err(e) => panic!("failed to issue test token: {e}"),
    }
}
