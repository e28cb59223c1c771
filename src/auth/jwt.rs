//! Access and refresh tokens
//!
//! HS256 JWTs carrying the user id, first name and role. Access tokens are
//! short-lived; refresh tokens only mint new access tokens.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::users::model::{Role, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub user_id: i64,
    pub first_name: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Signs and verifies every token the service hands out
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    pub(crate) link_lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        access_lifetime: Duration,
        refresh_lifetime: Duration,
        link_lifetime: Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_lifetime,
            refresh_lifetime,
            link_lifetime,
        }
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let secret = config.get_jwt_secret()?;
        Ok(Self::new(
            secret.as_bytes(),
            Duration::minutes(config.auth.access_token_minutes),
            Duration::days(config.auth.refresh_token_days),
            Duration::hours(config.auth.link_token_hours),
        ))
    }

    fn issue(&self, user: &User, token_type: TokenType, lifetime: Duration) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            token_type,
            user_id: user.id,
            first_name: user.first_name.clone(),
            role: user.role,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };
        self.sign(&claims)
    }

    pub(crate) fn sign<T: Serialize>(&self, claims: &T) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("token signing failed: {e}")))
    }

    pub(crate) fn verify_claims<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Option<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<T>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    pub fn issue_access(&self, user: &User) -> AppResult<String> {
        self.issue(user, TokenType::Access, self.access_lifetime)
    }

    pub fn issue_pair(&self, user: &User) -> AppResult<TokenPair> {
        Ok(TokenPair {
            refresh: self.issue(user, TokenType::Refresh, self.refresh_lifetime)?,
            access: self.issue_access(user)?,
        })
    }

    /// Verify signature, expiry and token type
    pub fn verify(&self, token: &str, expected: TokenType) -> AppResult<Claims> {
        self.verify_claims::<Claims>(token)
            .filter(|claims| claims.token_type == expected)
            .ok_or(AppError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            email: "cashier@luks.example".to_string(),
            username: None,
            first_name: "Rosa".to_string(),
            last_name: "Reyes".to_string(),
            password_hash: String::new(),
            role: Role::Staff,
            is_active: true,
            agreed_to_terms_at: None,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    fn service() -> TokenService {
        TokenService::new(
            b"test-secret",
            Duration::minutes(5),
            Duration::days(1),
            Duration::hours(72),
        )
    }

    #[test]
    fn test_pair_carries_identity() {
        let tokens = service();
        let pair = tokens.issue_pair(&sample_user()).unwrap();

        let access = tokens.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(access.user_id, 7);
        assert_eq!(access.first_name, "Rosa");
        assert_eq!(access.role, Role::Staff);

        let refresh = tokens.verify(&pair.refresh, TokenType::Refresh).unwrap();
        assert!(refresh.exp > access.exp);
        assert_ne!(refresh.jti, access.jti);
    }

    #[test]
    fn test_token_type_is_enforced() {
        let tokens = service();
        let pair = tokens.issue_pair(&sample_user()).unwrap();
        assert!(matches!(
            tokens.verify(&pair.refresh, TokenType::Access),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new(
            b"test-secret",
            Duration::seconds(-10),
            Duration::days(1),
            Duration::hours(1),
        );
        let access = tokens.issue_access(&sample_user()).unwrap();
        assert!(tokens.verify(&access, TokenType::Access).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let access = service().issue_access(&sample_user()).unwrap();
        let other = TokenService::new(
            b"other-secret",
            Duration::minutes(5),
            Duration::days(1),
            Duration::hours(72),
        );
        assert!(other.verify(&access, TokenType::Access).is_err());
        assert!(service().verify("garbage", TokenType::Access).is_err());
    }
}
