//! Test helpers and utilities for integration tests

use restaurant_pos::http::{build_routes, AppState};
use restaurant_pos::observability::HealthChecker;
use restaurant_pos::testing::{bearer, create_user};
use restaurant_pos::users::Role;
use serde_json::Value;
use std::path::PathBuf;

/// Status code and decoded JSON body of one response
#[allow(dead_code)]
pub struct TestResponse {
    pub status: u16,
    pub body: Value,
}

/// Send one request through the full route tree
#[allow(dead_code)]
pub async fn send(
    state: &AppState,
    method: &str,
    path: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let checker = HealthChecker::new(state.db.clone(), PathBuf::from("/nonexistent/kb.txt"));
    let routes = build_routes(state.clone(), checker);

    let mut request = warp::test::request().method(method).path(path);
    if let Some(auth) = auth {
        request = request.header("authorization", auth);
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.reply(&routes).await;
    let body = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body()).unwrap_or(Value::Null)
    };
    TestResponse {
        status: response.status().as_u16(),
        body,
    }
}

#[allow(dead_code)]
pub async fn get(state: &AppState, path: &str, auth: Option<&str>) -> TestResponse {
    send(state, "GET", path, auth, None).await
}

#[allow(dead_code)]
pub async fn post(state: &AppState, path: &str, auth: Option<&str>, body: Value) -> TestResponse {
    send(state, "POST", path, auth, Some(body)).await
}

/// Create an active account and return its bearer header
#[allow(dead_code)]
pub fn login_as(state: &AppState, email: &str, role: Role) -> String {
    let user = create_user(&state.db, email, "password123", role).unwrap();
    bearer(state, &user)
}

/// Create a category and an item with one size; returns the size id
#[allow(dead_code)]
pub async fn seed_menu_item(
    state: &AppState,
    admin: &str,
    name: &str,
    price: &str,
    stock_level: i64,
) -> i64 {
    let category = post(
        state,
        "/api/menu/admin/categories/",
        Some(admin),
        serde_json::json!({"name": format!("{name} Category")}),
    )
    .await;
    assert_eq!(category.status, 201, "{}", category.body);

    let item = post(
        state,
        "/api/menu/admin/items/",
        Some(admin),
        serde_json::json!({
            "name": name,
            "category_id": category.body["id"],
            "variations": [
                {"size_name": "Regular", "price": price, "stock_level": stock_level}
            ]
        }),
    )
    .await;
    assert_eq!(item.status, 201, "{}", item.body);
    item.body["variations"][0]["id"].as_i64().unwrap()
}
