//! `/api/users/` endpoints

use super::model::{NewUser, Role, User, UserProfile};
use super::store;
use crate::auth::password::MIN_PASSWORD_LENGTH;
use crate::auth::{decode_uid, hash_password, verify_password, LinkPurpose, TokenType};
use crate::email::{send_logged, templates};
use crate::error::{AppError, AppResult};
use crate::http::filters::{admin, authenticated, json_body, query_map, update_method, with_state};
use crate::http::pagination::Paginator;
use crate::http::reply;
use crate::http::state::AppState;
use crate::http::validate::Form;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::Filter;

const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials.";

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let register_route = warp::path!("api" / "users" / "register")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .then(register)
        .map(reply::render);

    let token = warp::path!("api" / "users" / "token")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .then(obtain_token)
        .map(reply::render);

    let refresh = warp::path!("api" / "users" / "token" / "refresh")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .then(refresh_token)
        .map(reply::render);

    let dashboard = warp::path!("api" / "users" / "admin" / "dashboard-data")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .then(dashboard_data)
        .map(reply::render);

    let profile_get = warp::path!("api" / "users" / "profile")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .map(|user: User| reply::ok(&UserProfile::from(&user)));

    let profile_update = warp::path!("api" / "users" / "profile")
        .and(update_method())
        .and(with_state(state.clone()))
        .and(authenticated(state.clone()))
        .and(json_body())
        .then(update_profile)
        .map(reply::render);

    let change_password_route = warp::path!("api" / "users" / "change-password")
        .and(update_method())
        .and(with_state(state.clone()))
        .and(authenticated(state.clone()))
        .and(json_body())
        .then(change_password)
        .map(reply::render);

    let staff_list = warp::path!("api" / "users" / "admin" / "staff")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .and(query_map())
        .then(list_staff)
        .map(reply::render);

    let staff_create = warp::path!("api" / "users" / "admin" / "staff")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .and(json_body())
        .then(create_staff)
        .map(reply::render);

    let staff_get = warp::path!("api" / "users" / "admin" / "staff" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .then(get_staff)
        .map(reply::render);

    let staff_update = warp::path!("api" / "users" / "admin" / "staff" / i64)
        .and(update_method())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .and(json_body())
        .then(update_staff)
        .map(reply::render);

    let staff_delete = warp::path!("api" / "users" / "admin" / "staff" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .then(delete_staff)
        .map(reply::render);

    let activate = warp::path!("api" / "users" / "activate" / String / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(activate_account)
        .map(reply::render);

    let reset_request = warp::path!("api" / "users" / "password-reset")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .then(request_password_reset)
        .map(reply::render);

    let reset_confirm = warp::path!("api" / "users" / "password-reset" / "confirm" / String / String)
        .and(warp::post())
        .and(with_state(state))
        .and(json_body())
        .then(confirm_password_reset)
        .map(reply::render);

    register_route
        .or(token)
        .unify()
        .or(refresh)
        .unify()
        .or(dashboard)
        .unify()
        .or(profile_get)
        .unify()
        .or(profile_update)
        .unify()
        .or(change_password_route)
        .unify()
        .or(staff_list)
        .unify()
        .or(staff_create)
        .unify()
        .or(staff_get)
        .unify()
        .or(staff_update)
        .unify()
        .or(staff_delete)
        .unify()
        .or(activate)
        .unify()
        .or(reset_request)
        .unify()
        .or(reset_confirm)
        .unify()
        .boxed()
}

struct AccountFields {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

fn account_fields(body: Value) -> AppResult<AccountFields> {
    let mut form = Form::new(body)?;
    let email = form.required_str("email");
    form.email("email", &email);
    let password = form.required_secret("password");
    form.min_length("password", &password, MIN_PASSWORD_LENGTH);
    let first_name = form.optional_text("first_name").unwrap_or_default();
    let last_name = form.optional_text("last_name").unwrap_or_default();
    form.finish()?;
    Ok(AccountFields {
        email,
        password,
        first_name,
        last_name,
    })
}

async fn send_activation(state: &AppState, user: &User, staff_invite: bool) -> AppResult<()> {
    let tail = state.tokens.link_path(user, LinkPurpose::Activation)?;
    let link = state.frontend_link("activate", &tail);
    let message = templates::activation_email(&user.email, &user.first_name, &link, staff_invite);
    send_logged(state.mailer.as_ref(), &message).await;
    Ok(())
}

async fn register(state: AppState, body: Value) -> AppResult<Response> {
    let fields = account_fields(body)?;
    let now = Utc::now();
    let new = NewUser {
        email: fields.email,
        password_hash: hash_password(&fields.password)?,
        first_name: fields.first_name,
        last_name: fields.last_name,
        role: Role::Customer,
        is_active: false,
        agreed_to_terms_at: Some(now),
    };
    let user = state.db.write(|tx| store::insert_user(tx, &new, now))?;
    info!(user_id = user.id, "Customer registered");

    send_activation(&state, &user, false).await?;

    Ok(reply::created(&json!({
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
    })))
}

async fn obtain_token(state: AppState, body: Value) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let email = form.required_str("email");
    let password = form.required_secret("password");
    form.finish()?;

    let user = state
        .db
        .read(|conn| store::find_by_email(conn, &email))?
        .ok_or_else(|| AppError::authentication_failed(NO_ACTIVE_ACCOUNT, "authentication_failed"))?;

    if !user.is_active {
        return Err(AppError::authentication_failed(
            "Your account is not active. Please check your email for the activation link.",
            "account_not_active",
        ));
    }

    if !verify_password(&password, &user.password_hash) {
        return Err(AppError::authentication_failed(
            NO_ACTIVE_ACCOUNT,
            "no_active_account",
        ));
    }

    state
        .db
        .write(|tx| store::touch_last_login(tx, user.id, Utc::now()))?;
    let pair = state.tokens.issue_pair(&user)?;

    Ok(reply::ok(&json!({
        "refresh": pair.refresh,
        "access": pair.access,
        "role": user.role,
        "id": user.id,
    })))
}

async fn refresh_token(state: AppState, body: Value) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let refresh = form.required_secret("refresh");
    form.finish()?;

    let claims = state.tokens.verify(&refresh, TokenType::Refresh)?;
    let user = state
        .db
        .read(|conn| store::find_by_id(conn, claims.user_id))?
        .filter(|user| user.is_active)
        .ok_or(AppError::InvalidToken)?;

    Ok(reply::ok(&json!({ "access": state.tokens.issue_access(&user)? })))
}

async fn dashboard_data(state: AppState, _admin: User) -> AppResult<Response> {
    let total_users = state.db.read(store::count_users)?;
    Ok(reply::ok(&json!({
        "message": "Welcome to the Admin Dashboard!",
        "total_users": total_users,
    })))
}

async fn update_profile(
    partial: bool,
    state: AppState,
    user: User,
    body: Value,
) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let email = if partial {
        form.optional_str("email")
    } else {
        Some(form.required_str("email"))
    };
    if let Some(email) = &email {
        form.email("email", email);
    }
    let first_name = form.optional_text("first_name");
    let last_name = form.optional_text("last_name");
    form.finish()?;

    let email = email.unwrap_or_else(|| user.email.clone());
    let first_name = first_name.unwrap_or_else(|| user.first_name.clone());
    let last_name = last_name.unwrap_or_else(|| user.last_name.clone());

    let updated = state.db.write(|tx| {
        store::update_profile(tx, user.id, &email, &first_name, &last_name)?;
        store::find_by_id(tx, user.id)?.ok_or(AppError::MissingObject)
    })?;
    Ok(reply::ok(&UserProfile::from(&updated)))
}

async fn change_password(
    _partial: bool,
    state: AppState,
    user: User,
    body: Value,
) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let old_password = form.required_secret("old_password");
    let new_password = form.required_secret("new_password");
    form.min_length("new_password", &new_password, MIN_PASSWORD_LENGTH);
    let confirm = form.required_secret("confirm_new_password");
    form.min_length("confirm_new_password", &confirm, MIN_PASSWORD_LENGTH);
    if form.is_valid() && new_password != confirm {
        form.add_error("new_password", "New passwords must match.");
    }
    form.finish()?;

    if !verify_password(&old_password, &user.password_hash) {
        return Err(AppError::field("old_password", "Wrong password."));
    }

    let hash = hash_password(&new_password)?;
    state.db.write(|tx| store::set_password(tx, user.id, &hash))?;
    Ok(reply::detail("Password updated successfully"))
}

async fn list_staff(
    state: AppState,
    _admin: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let paginator = Paginator::from_query("/api/users/admin/staff/", &query, &state.config.server)?;
    let page = state.db.read(|conn| {
        let count = store::count_by_role(conn, Role::Staff)?;
        paginator.paginate(count, |limit, offset| {
            Ok(store::list_staff(conn, limit, offset)?
                .iter()
                .map(UserProfile::from)
                .collect())
        })
    })?;
    Ok(reply::ok(&page))
}

async fn create_staff(state: AppState, _admin: User, body: Value) -> AppResult<Response> {
    let fields = account_fields(body)?;
    let new = NewUser {
        email: fields.email,
        password_hash: hash_password(&fields.password)?,
        first_name: fields.first_name,
        last_name: fields.last_name,
        role: Role::Staff,
        is_active: false,
        agreed_to_terms_at: None,
    };
    let user = state.db.write(|tx| store::insert_user(tx, &new, Utc::now()))?;
    info!(user_id = user.id, "Staff account created");

    send_activation(&state, &user, true).await?;
    Ok(reply::created(&UserProfile::from(&user)))
}

fn load_staff(state: &AppState, id: i64) -> AppResult<User> {
    state
        .db
        .read(|conn| store::find_staff(conn, id))?
        .ok_or(AppError::MissingObject)
}

async fn get_staff(id: i64, state: AppState, _admin: User) -> AppResult<Response> {
    let staff = load_staff(&state, id)?;
    Ok(reply::ok(&UserProfile::from(&staff)))
}

async fn update_staff(
    id: i64,
    partial: bool,
    state: AppState,
    _admin: User,
    body: Value,
) -> AppResult<Response> {
    let staff = load_staff(&state, id)?;

    let mut form = Form::new(body)?;
    let email = if partial {
        form.optional_str("email")
    } else {
        Some(form.required_str("email"))
    };
    if let Some(email) = &email {
        form.email("email", email);
    }
    let password = if partial {
        form.raw("password")
            .is_some()
            .then(|| form.required_secret("password"))
    } else {
        Some(form.required_secret("password"))
    };
    if let Some(password) = &password {
        form.min_length("password", password, MIN_PASSWORD_LENGTH);
    }
    let first_name = form.optional_text("first_name");
    let last_name = form.optional_text("last_name");
    form.finish()?;

    let password_hash = password.as_deref().map(hash_password).transpose()?;
    let email = email.unwrap_or_else(|| staff.email.clone());
    let first_name = first_name.unwrap_or_else(|| staff.first_name.clone());
    let last_name = last_name.unwrap_or_else(|| staff.last_name.clone());

    let updated = state.db.write(|tx| {
        store::update_profile(tx, staff.id, &email, &first_name, &last_name)?;
        if let Some(hash) = &password_hash {
            store::set_password(tx, staff.id, hash)?;
        }
        store::find_by_id(tx, staff.id)?.ok_or(AppError::MissingObject)
    })?;
    Ok(reply::ok(&UserProfile::from(&updated)))
}

async fn delete_staff(id: i64, state: AppState, admin: User) -> AppResult<Response> {
    if id == admin.id {
        return Err(AppError::forbidden(
            "Admins cannot delete their own account through this interface.",
        ));
    }
    let staff = load_staff(&state, id)?;
    state.db.write(|tx| store::delete_user(tx, staff.id))?;
    info!(user_id = staff.id, "Staff account deleted");
    Ok(reply::no_content())
}

fn user_from_link(state: &AppState, uidb64: &str) -> AppResult<Option<User>> {
    match decode_uid(uidb64) {
        Some(id) => state.db.read(|conn| store::find_by_id(conn, id)),
        None => Ok(None),
    }
}

async fn activate_account(uidb64: String, token: String, state: AppState) -> AppResult<Response> {
    let user = user_from_link(&state, &uidb64)?
        .filter(|user| state.tokens.check_link_token(user, LinkPurpose::Activation, &token))
        .ok_or_else(|| AppError::bad_request("Activation link is invalid or has expired."))?;

    if user.is_active {
        return Ok(reply::detail("Account is already active."));
    }
    state.db.write(|tx| store::set_active(tx, user.id, true))?;
    info!(user_id = user.id, "Account activated");
    Ok(reply::detail("Account activated successfully."))
}

async fn request_password_reset(state: AppState, body: Value) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let email = form.required_str("email");
    form.email("email", &email);
    form.finish()?;

    if let Some(user) = state.db.read(|conn| store::find_by_email(conn, &email))? {
        let tail = state.tokens.link_path(&user, LinkPurpose::PasswordReset)?;
        let link = state.frontend_link("reset-password", &tail);
        let message = templates::password_reset_email(&user.email, &user.first_name, &link);
        send_logged(state.mailer.as_ref(), &message).await;
    }

    Ok(reply::detail(
        "If an account with that email exists, a password reset link has been sent.",
    ))
}

async fn confirm_password_reset(
    uidb64: String,
    token: String,
    state: AppState,
    body: Value,
) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let password = form.required_secret("password");
    form.min_length("password", &password, MIN_PASSWORD_LENGTH);
    let confirm = form.required_secret("confirm_password");
    if form.is_valid() && password != confirm {
        form.add_error("non_field_errors", "Passwords do not match.");
    }
    form.finish()?;

    let user = user_from_link(&state, &uidb64)?
        .filter(|user| {
            state
                .tokens
                .check_link_token(user, LinkPurpose::PasswordReset, &token)
        })
        .ok_or_else(|| AppError::bad_request("The reset link is invalid or has expired."))?;

    let hash = hash_password(&password)?;
    state.db.write(|tx| {
        store::set_password(tx, user.id, &hash)?;
        if !user.is_active {
            store::set_active(tx, user.id, true)?;
        }
        Ok(())
    })?;
    info!(user_id = user.id, "Password reset completed");
    Ok(reply::detail("Password has been reset successfully."))
}
