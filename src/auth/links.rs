//! One-time account links (activation and password reset)
//!
//! A link is `{uidb64}/{token}`. The token is a signed JWT naming its
//! purpose and carrying a fingerprint of the account's password hash, email
//! and last login, so it stops verifying as soon as any of those change.

use super::jwt::TokenService;
use crate::error::AppResult;
use crate::users::model::User;
use crate::users::store::last_login_text;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPurpose {
    Activation,
    PasswordReset,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkClaims {
    purpose: LinkPurpose,
    uid: i64,
    fp: String,
    exp: i64,
    iat: i64,
}

fn fingerprint(user: &User) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.id.to_string());
    hasher.update(user.email.to_lowercase());
    hasher.update(&user.password_hash);
    hasher.update(last_login_text(user));
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

pub fn encode_uid(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

impl TokenService {
    pub fn make_link_token(&self, user: &User, purpose: LinkPurpose) -> AppResult<String> {
        let now = Utc::now();
        self.sign(&LinkClaims {
            purpose,
            uid: user.id,
            fp: fingerprint(user),
            exp: (now + self.link_lifetime).timestamp(),
            iat: now.timestamp(),
        })
    }

    pub fn check_link_token(&self, user: &User, purpose: LinkPurpose, token: &str) -> bool {
        self.verify_claims::<LinkClaims>(token)
            .map(|claims| {
                claims.purpose == purpose && claims.uid == user.id && claims.fp == fingerprint(user)
            })
            .unwrap_or(false)
    }

    /// `{uidb64}/{token}/` path tail for a frontend link
    pub fn link_path(&self, user: &User, purpose: LinkPurpose) -> AppResult<String> {
        Ok(format!(
            "{}/{}/",
            encode_uid(user.id),
            self.make_link_token(user, purpose)?
        ))
    }
}
