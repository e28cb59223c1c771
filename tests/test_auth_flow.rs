//! Account lifecycle through the HTTP surface
//!
//! Registration, activation links, token issue and refresh, profile edits,
//! password change and the password-reset round trip.

mod test_helpers;

use restaurant_pos::auth::LinkPurpose;
use restaurant_pos::testing::{test_state_with, MockFaceEmbedder, RecordingMailer};
use restaurant_pos::users::{store, Role};
use serde_json::json;
use std::sync::Arc;
use test_helpers::{get, login_as, post, send};

fn state_with_mailer() -> (restaurant_pos::http::AppState, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::new());
    let state = test_state_with(mailer.clone(), Arc::new(MockFaceEmbedder::new()));
    (state, mailer)
}

async fn register(state: &restaurant_pos::http::AppState, email: &str) -> test_helpers::TestResponse {
    post(
        state,
        "/api/users/register/",
        None,
        json!({
            "email": email,
            "password": "sinigang2024",
            "first_name": "Maria",
            "last_name": "Santos",
        }),
    )
    .await
}

#[tokio::test]
async fn test_registration_requires_activation_before_login() {
    let (state, mailer) = state_with_mailer();

    let res = register(&state, "maria@example.com").await;
    assert_eq!(res.status, 201);
    assert_eq!(
        res.body,
        json!({"email": "maria@example.com", "first_name": "Maria", "last_name": "Santos"})
    );

    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "maria@example.com");

    let login = post(
        &state,
        "/api/users/token/",
        None,
        json!({"email": "maria@example.com", "password": "sinigang2024"}),
    )
    .await;
    assert_eq!(login.status, 401);
    assert_eq!(login.body["code"], "account_not_active");

    let user = state
        .db
        .read(|conn| store::find_by_email(conn, "maria@example.com"))
        .unwrap()
        .unwrap();
    let tail = state
        .tokens
        .link_path(&user, LinkPurpose::Activation)
        .unwrap();
    let uid = tail.split('/').next().unwrap();
    assert!(sent[0].html.contains(&format!("/activate/{uid}/")));

    let res = get(&state, &format!("/api/users/activate/{tail}"), None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["detail"], "Account activated successfully.");

    let res = get(&state, &format!("/api/users/activate/{tail}"), None).await;
    assert_eq!(res.body["detail"], "Account is already active.");

    let login = post(
        &state,
        "/api/users/token/",
        None,
        json!({"email": "maria@example.com", "password": "sinigang2024"}),
    )
    .await;
    assert_eq!(login.status, 200);
    assert_eq!(login.body["role"], "customer");
    assert_eq!(login.body["id"], user.id);
    assert!(login.body["access"].is_string());
    assert!(login.body["refresh"].is_string());
}

#[tokio::test]
async fn test_tampered_activation_link_is_rejected() {
    let (state, _mailer) = state_with_mailer();
    register(&state, "jun@example.com").await;

    let res = get(&state, "/api/users/activate/MQ/not-a-token/", None).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["error"], "Activation link is invalid or has expired.");
}

#[tokio::test]
async fn test_registration_validation_errors_are_keyed_by_field() {
    let (state, mailer) = state_with_mailer();

    let res = post(
        &state,
        "/api/users/register/",
        None,
        json!({"email": "not-an-email", "password": "short"}),
    )
    .await;
    assert_eq!(res.status, 400);
    assert!(res.body.get("email").is_some());
    assert!(res.body.get("password").is_some());
    assert!(mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let (state, _mailer) = state_with_mailer();
    login_as(&state, "cook@example.com", Role::Staff);

    let res = post(
        &state,
        "/api/users/token/",
        None,
        json!({"email": "cook@example.com", "password": "wrong-password"}),
    )
    .await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "no_active_account");
}

#[tokio::test]
async fn test_refresh_issues_a_working_access_token() {
    let (state, _mailer) = state_with_mailer();
    login_as(&state, "ana@example.com", Role::Customer);

    let login = post(
        &state,
        "/api/users/token/",
        None,
        json!({"email": "ana@example.com", "password": "password123"}),
    )
    .await;
    let refresh = login.body["refresh"].as_str().unwrap().to_string();

    let res = post(&state, "/api/users/token/refresh/", None, json!({"refresh": refresh})).await;
    assert_eq!(res.status, 200);
    let access = res.body["access"].as_str().unwrap();

    let profile = get(&state, "/api/users/profile/", Some(&format!("Bearer {access}"))).await;
    assert_eq!(profile.status, 200);
    assert_eq!(profile.body["email"], "ana@example.com");

    // an access token is not accepted where a refresh token is expected
    let res = post(
        &state,
        "/api/users/token/refresh/",
        None,
        json!({"refresh": access}),
    )
    .await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_profile_update_and_password_change() {
    let (state, _mailer) = state_with_mailer();
    let auth = login_as(&state, "lito@example.com", Role::Customer);

    let res = send(
        &state,
        "PATCH",
        "/api/users/profile/",
        Some(&auth),
        Some(json!({"first_name": "Lito"})),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["first_name"], "Lito");
    assert_eq!(res.body["email"], "lito@example.com");

    let res = send(
        &state,
        "PUT",
        "/api/users/change-password/",
        Some(&auth),
        Some(json!({
            "old_password": "not-my-password",
            "new_password": "adobo-forever",
            "confirm_new_password": "adobo-forever",
        })),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["old_password"], json!(["Wrong password."]));

    let res = send(
        &state,
        "PUT",
        "/api/users/change-password/",
        Some(&auth),
        Some(json!({
            "old_password": "password123",
            "new_password": "adobo-forever",
            "confirm_new_password": "adobo-forever",
        })),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["detail"], "Password updated successfully");

    let login = post(
        &state,
        "/api/users/token/",
        None,
        json!({"email": "lito@example.com", "password": "adobo-forever"}),
    )
    .await;
    assert_eq!(login.status, 200);
}

#[tokio::test]
async fn test_changed_email_frees_the_old_address() {
    let (state, _mailer) = state_with_mailer();
    let auth = login_as(&state, "lito@example.com", Role::Customer);

    let res = send(
        &state,
        "PATCH",
        "/api/users/profile/",
        Some(&auth),
        Some(json!({"email": "lito.reyes@example.com"})),
    )
    .await;
    assert_eq!(res.status, 200, "{}", res.body);
    assert_eq!(res.body["email"], "lito.reyes@example.com");

    let res = register(&state, "lito@example.com").await;
    assert_eq!(res.status, 201, "{}", res.body);

    let res = register(&state, "LITO.REYES@example.com").await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["email"], json!(["user with this email already exists."]));
}

#[tokio::test]
async fn test_password_reset_round_trip() {
    let (state, mailer) = state_with_mailer();
    login_as(&state, "rosa@example.com", Role::Customer);

    let res = post(
        &state,
        "/api/users/password-reset/",
        None,
        json!({"email": "nobody@example.com"}),
    )
    .await;
    assert_eq!(res.status, 200);
    assert!(mailer.sent().await.is_empty());

    let res = post(
        &state,
        "/api/users/password-reset/",
        None,
        json!({"email": "rosa@example.com"}),
    )
    .await;
    assert_eq!(
        res.body["detail"],
        "If an account with that email exists, a password reset link has been sent."
    );
    assert_eq!(mailer.sent().await.len(), 1);

    let user = state
        .db
        .read(|conn| store::find_by_email(conn, "rosa@example.com"))
        .unwrap()
        .unwrap();
    let tail = state
        .tokens
        .link_path(&user, LinkPurpose::PasswordReset)
        .unwrap();
    let confirm_path = format!("/api/users/password-reset/confirm/{tail}");

    let res = post(
        &state,
        &confirm_path,
        None,
        json!({"password": "kare-kare-99", "confirm_password": "kare-kare-98"}),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["non_field_errors"], json!(["Passwords do not match."]));

    let res = post(
        &state,
        &confirm_path,
        None,
        json!({"password": "kare-kare-99", "confirm_password": "kare-kare-99"}),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["detail"], "Password has been reset successfully.");

    // the password hash changed, so the same link no longer verifies
    let res = post(
        &state,
        &confirm_path,
        None,
        json!({"password": "kare-kare-00", "confirm_password": "kare-kare-00"}),
    )
    .await;
    assert_eq!(res.status, 400);

    let login = post(
        &state,
        "/api/users/token/",
        None,
        json!({"email": "rosa@example.com", "password": "kare-kare-99"}),
    )
    .await;
    assert_eq!(login.status, 200);
}

#[tokio::test]
async fn test_staff_management_is_admin_only() {
    let (state, mailer) = state_with_mailer();
    let admin = login_as(&state, "owner@example.com", Role::Admin);
    let staff = login_as(&state, "cashier@example.com", Role::Staff);

    let res = get(&state, "/api/users/admin/staff/", Some(&staff)).await;
    assert_eq!(res.status, 403);

    let res = post(
        &state,
        "/api/users/admin/staff/",
        Some(&admin),
        json!({
            "email": "newcook@example.com",
            "password": "welcome123",
            "first_name": "Ben",
            "last_name": "Cruz",
        }),
    )
    .await;
    assert_eq!(res.status, 201);
    assert_eq!(res.body["role"], "staff");
    assert_eq!(mailer.sent().await.len(), 1);

    let res = get(&state, "/api/users/admin/dashboard-data/", Some(&admin)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["message"], "Welcome to the Admin Dashboard!");
    assert_eq!(res.body["total_users"], 3);

    let owner = state
        .db
        .read(|conn| store::find_by_email(conn, "owner@example.com"))
        .unwrap()
        .unwrap();
    let res = send(
        &state,
        "DELETE",
        &format!("/api/users/admin/staff/{}/", owner.id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(res.status, 403);
    assert_eq!(
        res.body["error"],
        "Admins cannot delete their own account through this interface."
    );
}
