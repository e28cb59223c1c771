//! Shared warp filters: state injection, JSON bodies and permissions
//!
//! Permission filters reject with an [`AppError`] so the recovery handler
//! renders the same bodies the handlers do.

use super::state::AppState;
use crate::auth::TokenType;
use crate::error::{AppError, AppResult};
use crate::users::model::User;
use crate::users::store;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use warp::{Filter, Rejection};

/// Largest accepted request body; face images arrive base64-encoded
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_body() -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn query_map() -> impl Filter<Extract = (HashMap<String, String>,), Error = Rejection> + Clone {
    warp::query::<HashMap<String, String>>()
}

/// Resolve a bearer header to an active user
pub fn authenticate(state: &AppState, header: Option<&str>) -> AppResult<User> {
    let header = header.ok_or(AppError::Unauthenticated)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthenticated)?;

    let claims = state.tokens.verify(token, TokenType::Access)?;
    let user = state
        .db
        .read(|conn| store::find_by_id(conn, claims.user_id))?
        .ok_or_else(|| AppError::authentication_failed("User not found", "user_not_found"))?;

    if !user.is_active {
        return Err(AppError::authentication_failed(
            "User is inactive",
            "user_inactive",
        ));
    }
    Ok(user)
}

pub fn authenticated(state: AppState) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            authenticate(&state, header.as_deref()).map_err(warp::reject::custom)
        })
}

/// Role `admin` only
pub fn admin(state: AppState) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    authenticated(state).and_then(|user: User| async move {
        if user.role == crate::users::model::Role::Admin {
            Ok(user)
        } else {
            Err(warp::reject::custom(AppError::PermissionDenied))
        }
    })
}

/// Role `admin` or `staff`
pub fn staff(state: AppState) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    authenticated(state).and_then(|user: User| async move {
        if user.role.is_staff() {
            Ok(user)
        } else {
            Err(warp::reject::custom(AppError::PermissionDenied))
        }
    })
}

/// PUT or PATCH; extracts `true` for a partial (PATCH) update
pub fn update_method() -> impl Filter<Extract = (bool,), Error = Rejection> + Clone {
    warp::put()
        .map(|| false)
        .or(warp::patch().map(|| true))
        .unify()
}
