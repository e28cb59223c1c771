//! Face registration and face login for staff

mod test_helpers;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use restaurant_pos::http::AppState;
use restaurant_pos::testing::{test_state_with, MockFaceEmbedder, RecordingMailer};
use restaurant_pos::users::Role;
use serde_json::json;
use std::sync::Arc;
use test_helpers::{login_as, post, send};

const CASHIER_ENROLL: &[u8] = b"cashier-enrollment-photo";
const CASHIER_PROBE: &[u8] = b"cashier-at-the-counter";
const CUSTOMER_PHOTO: &[u8] = b"customer-selfie";
const STRANGER: &[u8] = b"stranger-photo";
const BLANK_WALL: &[u8] = b"blank-wall";

fn embedding(base: f32) -> Vec<f32> {
    (0..128).map(|i| base + i as f32 * 0.01).collect()
}

fn state() -> AppState {
    let embedder = MockFaceEmbedder::new()
        .with_face(CASHIER_ENROLL, embedding(0.0))
        .with_face(CASHIER_PROBE, embedding(0.05))
        .with_face(CUSTOMER_PHOTO, embedding(5.0))
        .with_face(STRANGER, embedding(50.0));
    test_state_with(Arc::new(RecordingMailer::new()), Arc::new(embedder))
}

fn image(bytes: &[u8]) -> serde_json::Value {
    json!({ "image": format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)) })
}

#[tokio::test]
async fn test_registered_staff_face_logs_in() {
    let state = state();
    let cashier = login_as(&state, "cashier@example.com", Role::Staff);

    let res = post(&state, "/api/face/upload_face/", Some(&cashier), image(CASHIER_ENROLL)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["status"], "Face data uploaded successfully");

    let res = post(&state, "/api/face/verify_face/", None, image(CASHIER_PROBE)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["verified"], true);
    assert_eq!(res.body["role"], "staff");
    let token = res.body["token"].as_str().unwrap();

    let res = post(
        &state,
        "/api/orders/admin/create-pos/",
        Some(&format!("Bearer {token}")),
        json!({"items": []}),
    )
    .await;
    // authenticated as staff; the empty cart is what gets refused
    assert_eq!(res.status, 400);
    assert_eq!(res.body["error"], "Order must contain items.");
}

#[tokio::test]
async fn test_unknown_and_customer_faces_are_refused() {
    let state = state();
    let cashier = login_as(&state, "cashier@example.com", Role::Staff);
    let customer = login_as(&state, "diner@example.com", Role::Customer);
    post(&state, "/api/face/upload_face/", Some(&cashier), image(CASHIER_ENROLL)).await;
    post(&state, "/api/face/upload_face/", Some(&customer), image(CUSTOMER_PHOTO)).await;

    let res = post(&state, "/api/face/verify_face/", None, image(STRANGER)).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body, json!({"verified": false, "error": "Face not recognized."}));

    let res = post(&state, "/api/face/verify_face/", None, image(CUSTOMER_PHOTO)).await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["error"], "Unauthorized role");

    let res = post(&state, "/api/face/verify_face/", None, image(BLANK_WALL)).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["error"], "Liveness check failed");

    let res = post(
        &state,
        "/api/face/verify_face/",
        None,
        json!({"image": "%%% not base64 %%%"}),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["verified"], false);
}

#[tokio::test]
async fn test_deleting_face_data_disables_face_login() {
    let state = state();
    let cashier = login_as(&state, "cashier@example.com", Role::Staff);
    post(&state, "/api/face/upload_face/", Some(&cashier), image(CASHIER_ENROLL)).await;

    let res = send(&state, "DELETE", "/api/face/delete_face/", Some(&cashier), None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["status"], "Face data deleted");

    let res = send(&state, "DELETE", "/api/face/delete_face/", Some(&cashier), None).await;
    assert_eq!(res.body["status"], "No face data to delete");

    let res = post(&state, "/api/face/verify_face/", None, image(CASHIER_PROBE)).await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_upload_requires_a_detectable_face() {
    let state = state();
    let cashier = login_as(&state, "cashier@example.com", Role::Staff);

    let res = post(&state, "/api/face/upload_face/", Some(&cashier), image(BLANK_WALL)).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["error"], "Liveness check failed");

    let res = post(&state, "/api/face/upload_face/", None, image(CASHIER_ENROLL)).await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_face_service_outage_is_a_server_error() {
    let state = test_state_with(
        Arc::new(RecordingMailer::new()),
        Arc::new(MockFaceEmbedder::unavailable()),
    );
    let cashier = login_as(&state, "cashier@example.com", Role::Staff);

    let res = post(&state, "/api/face/upload_face/", Some(&cashier), image(CASHIER_ENROLL)).await;
    assert_eq!(res.status, 500);
}
