//! Weekly recommendation generation and its review endpoints

mod test_helpers;

use chrono::{Duration, Utc};
use restaurant_pos::analytics::generate_reports;
use restaurant_pos::clock;
use restaurant_pos::config::AppConfig;
use restaurant_pos::http::AppState;
use restaurant_pos::recommendation::{generate_weekly_recommendation, RecommendationOutcome};
use restaurant_pos::testing::{test_state, MockLlmProvider};
use restaurant_pos::users::Role;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use test_helpers::{get, login_as, send};

const NOTES: &str = "Upselling: pair every rice meal with a drink to lift the average order size.\n\n\
                     Off-peak hours: a 2-5pm merienda promo brings customers in during slow hours.\n\n\
                     Menu optimization: feature best sellers at the top of the menu board.";

fn knowledge_base() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{NOTES}").unwrap();
    file
}

fn config_with(state: &AppState, kb: &NamedTempFile) -> AppConfig {
    let mut config = (*state.config).clone();
    config.recommendation.knowledge_base_path = kb.path().to_path_buf();
    config
}

/// Write empty snapshots for last week and the week before
fn seed_two_weeks(state: &AppState) {
    let offset = state.offset();
    let today = clock::today(offset);
    generate_reports(&state.db, today - Duration::days(7), offset, Utc::now()).unwrap();
    generate_reports(&state.db, today, offset, Utc::now()).unwrap();
}

#[tokio::test]
async fn test_recommendation_is_generated_viewed_and_reviewed() {
    let state = test_state();
    let admin = login_as(&state, "owner@example.com", Role::Admin);
    let kb = knowledge_base();
    let config = config_with(&state, &kb);

    let res = get(&state, "/api/analytics/recommendation/", Some(&admin)).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["message"], "No recommendations available yet.");

    seed_two_weeks(&state);

    // the newest week is handled first, then the one before it
    let provider = MockLlmProvider::new(vec![
        "## Weekly Business Insights\nRun a merienda promo.".to_string(),
        "## Weekly Business Insights\nBundle drinks.".to_string(),
    ]);
    let first = generate_weekly_recommendation(&state.db, &provider, &config)
        .await
        .unwrap();
    let RecommendationOutcome::Stored { report_id } = first else {
        panic!("expected a stored recommendation, got {first:?}");
    };

    let res = get(&state, "/api/analytics/recommendation/", Some(&admin)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["id"], report_id);
    assert_eq!(res.body["report_type"], "weekly");
    assert_eq!(
        res.body["recommendation"],
        "## Weekly Business Insights\nRun a merienda promo."
    );
    assert_eq!(res.body["is_viewed"], true);
    assert_eq!(res.body["recommendation_status"], "pending");

    let second = generate_weekly_recommendation(&state.db, &provider, &config)
        .await
        .unwrap();
    assert!(matches!(second, RecommendationOutcome::Stored { report_id: older } if older != report_id));

    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].messages[0].content.contains("Off-peak hours"));
    // the older week has nothing before it
    assert!(requests[1].messages[0]
        .content
        .contains("N/A (First week of data)"));

    let third = generate_weekly_recommendation(&state.db, &provider, &config)
        .await
        .unwrap();
    assert_eq!(third, RecommendationOutcome::NothingPending);

    // the dashboard still shows the newest week
    let res = get(&state, "/api/analytics/recommendation/", Some(&admin)).await;
    assert_eq!(res.body["id"], report_id);

    let res = send(
        &state,
        "PATCH",
        "/api/analytics/recommendation/",
        Some(&admin),
        Some(json!({"report_id": report_id.to_string(), "status": "implemented"})),
    )
    .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["success"], "Status updated successfully.");

    let res = get(&state, "/api/analytics/recommendation/", Some(&admin)).await;
    assert_eq!(res.body["recommendation_status"], "implemented");
    assert_eq!(res.body["recommendation_status_display"], "Implemented");
    assert!(res.body["recommendation_updated_at"].is_string());
}

#[tokio::test]
async fn test_status_update_validation() {
    let state = test_state();
    let admin = login_as(&state, "owner@example.com", Role::Admin);

    let res = send(
        &state,
        "PATCH",
        "/api/analytics/recommendation/",
        Some(&admin),
        Some(json!({"status": "implemented"})),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["error"], "report_id and status are required.");

    let res = send(
        &state,
        "PATCH",
        "/api/analytics/recommendation/",
        Some(&admin),
        Some(json!({"report_id": 1, "status": "approved"})),
    )
    .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["error"], "Invalid status provided.");

    let res = send(
        &state,
        "PATCH",
        "/api/analytics/recommendation/",
        Some(&admin),
        Some(json!({"report_id": 404, "status": "dismissed"})),
    )
    .await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["error"], "Report not found.");
}

#[tokio::test]
async fn test_failed_model_call_leaves_week_pending() {
    let state = test_state();
    let kb = knowledge_base();
    let config = config_with(&state, &kb);
    seed_two_weeks(&state);

    let outcome = generate_weekly_recommendation(&state.db, &MockLlmProvider::with_failure(), &config)
        .await
        .unwrap();
    let RecommendationOutcome::Failed { report_id, reason } = outcome else {
        panic!("expected a failure outcome");
    };
    assert!(reason.contains("503"));

    // a later run retries the same week
    let provider = MockLlmProvider::single_response("Try a weekday lunch bundle.");
    let outcome = generate_weekly_recommendation(&state.db, &provider, &config)
        .await
        .unwrap();
    assert_eq!(outcome, RecommendationOutcome::Stored { report_id });
}
