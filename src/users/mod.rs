//! Accounts, roles and JWT authentication

pub mod model;
pub mod routes;
pub mod store;

pub use model::{NewUser, Role, User, UserProfile};

use crate::auth::{hash_password, password::MIN_PASSWORD_LENGTH};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use chrono::Utc;

/// Create an active admin account (used by the `create-admin` command)
pub fn create_admin(
    db: &Database,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> AppResult<User> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::field(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LENGTH} characters."),
        ));
    }
    let new = NewUser {
        email: email.trim().to_string(),
        password_hash: hash_password(password)?,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        role: Role::Admin,
        is_active: true,
        agreed_to_terms_at: None,
    };
    db.write(|tx| store::insert_user(tx, &new, Utc::now()))
}
