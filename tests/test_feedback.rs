//! Customer feedback submission and the admin review list

mod test_helpers;

use restaurant_pos::testing::test_state;
use restaurant_pos::users::Role;
use serde_json::json;
use test_helpers::{get, login_as, post};

#[tokio::test]
async fn test_feedback_is_scored_and_listed_newest_first() {
    let state = test_state();
    let admin = login_as(&state, "owner@example.com", Role::Admin);
    let customer = login_as(&state, "diner@example.com", Role::Customer);

    for comment in [
        "The sinigang was delicious and the staff were friendly!",
        "Food arrived cold and the rice was stale.",
        "Ordered at noon.",
    ] {
        let res = post(
            &state,
            "/api/feedback/submit/",
            Some(&customer),
            json!({ "comment": comment }),
        )
        .await;
        assert_eq!(res.status, 201);
        assert_eq!(res.body, json!({ "comment": comment }));
    }

    let res = get(&state, "/api/feedback/admin/all/", Some(&admin)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["count"], 3);
    let labels: Vec<_> = res.body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["sentiment_label"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(labels, vec!["neutral", "negative", "positive"]);
    assert_eq!(res.body["results"][0]["user"]["email"], "diner@example.com");
}

#[tokio::test]
async fn test_feedback_validation() {
    let state = test_state();
    let customer = login_as(&state, "diner@example.com", Role::Customer);

    let res = post(&state, "/api/feedback/submit/", Some(&customer), json!({})).await;
    assert_eq!(res.status, 400);
    assert!(res.body.get("comment").is_some());

    let res = post(
        &state,
        "/api/feedback/submit/",
        Some(&customer),
        json!({ "comment": "a".repeat(251) }),
    )
    .await;
    assert_eq!(res.status, 400);
    assert!(res.body.get("comment").is_some());

    let res = post(&state, "/api/feedback/submit/", None, json!({ "comment": "hi" })).await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_feedback_list_is_admin_only() {
    let state = test_state();
    let staff = login_as(&state, "cook@example.com", Role::Staff);

    let res = get(&state, "/api/feedback/admin/all/", Some(&staff)).await;
    assert_eq!(res.status, 403);
}
