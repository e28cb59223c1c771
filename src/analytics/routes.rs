//! `/api/analytics/` endpoints (admin only)

use super::aggregate;
use super::model::{RecommendationStatus, ReportType};
use super::store;
use crate::clock;
use crate::db::codec::DATE_FORMAT;
use crate::error::{AppError, AppResult};
use crate::http::filters::{admin, json_body, query_map, with_state};
use crate::http::reply;
use crate::http::state::AppState;
use crate::users::model::User;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Filter;

const DEFAULT_PERFORMANCE_DAYS: i64 = 30;

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let latest = warp::path!("api" / "analytics")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .and(query_map())
        .then(latest_report)
        .map(reply::render);

    let performance = warp::path!("api" / "analytics" / "performance-report")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .and(query_map())
        .then(performance_report)
        .map(reply::render);

    let recommendation = warp::path!("api" / "analytics" / "recommendation")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin(state.clone()))
        .then(latest_recommendation)
        .map(reply::render);

    let recommendation_status = warp::path!("api" / "analytics" / "recommendation")
        .and(warp::patch())
        .and(with_state(state.clone()))
        .and(admin(state))
        .and(json_body())
        .then(update_recommendation_status)
        .map(reply::render);

    latest
        .or(performance)
        .unify()
        .or(recommendation)
        .unify()
        .or(recommendation_status)
        .unify()
        .boxed()
}

fn not_found_message(message: &str) -> Response {
    reply::json(StatusCode::NOT_FOUND, &json!({ "message": message }))
}

async fn latest_report(
    state: AppState,
    _admin: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let raw = query.get("report_type").map(String::as_str).unwrap_or("daily");
    let report_type =
        ReportType::parse(raw).ok_or_else(|| AppError::bad_request("Invalid report_type specified."))?;

    match state.db.read(|conn| store::latest_by_type(conn, report_type))? {
        Some(report) => Ok(reply::ok(&report)),
        None => Ok(not_found_message(
            "No analytics data found for the selected period.",
        )),
    }
}

/// Accepts `YYYY-MM-DD` or a longer ISO timestamp starting with one
fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), DATE_FORMAT).ok()
}

async fn performance_report(
    state: AppState,
    _admin: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let offset = state.offset();
    let today = clock::today(offset);
    let invalid = || AppError::bad_request("Invalid date format. Use YYYY-MM-DD.");

    let end = match query.get("end_date") {
        Some(raw) => parse_day(raw).ok_or_else(invalid)?,
        None => today,
    };
    let start = match query.get("start_date") {
        Some(raw) => parse_day(raw).ok_or_else(invalid)?,
        None => today - Duration::days(DEFAULT_PERFORMANCE_DAYS),
    };

    let report = state
        .db
        .read(|conn| aggregate::performance_report(conn, start, end, offset))?;
    Ok(reply::ok(&report))
}

async fn latest_recommendation(state: AppState, _admin: User) -> AppResult<Response> {
    let report = state.db.write(|tx| {
        let Some(mut report) = store::latest_weekly_with_recommendation(tx)? else {
            return Ok(None);
        };
        if !report.is_viewed {
            store::mark_viewed(tx, report.id)?;
            report.is_viewed = true;
        }
        Ok(Some(report))
    })?;

    match report {
        Some(report) => Ok(reply::ok(&report)),
        None => Ok(not_found_message("No recommendations available yet.")),
    }
}

async fn update_recommendation_status(
    state: AppState,
    admin: User,
    body: Value,
) -> AppResult<Response> {
    let report_id = body.get("report_id").and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    let (Some(report_id), Some(status)) = (report_id, status) else {
        return Err(AppError::bad_request("report_id and status are required."));
    };
    let status = RecommendationStatus::parse(status)
        .ok_or_else(|| AppError::bad_request("Invalid status provided."))?;

    let found = state
        .db
        .write(|tx| store::set_recommendation_status(tx, report_id, status, Utc::now()))?;
    if !found {
        return Err(AppError::not_found("Report not found."));
    }
    info!(
        report_id,
        admin_id = admin.id,
        status = status.as_str(),
        "Recommendation status updated"
    );
    Ok(reply::ok(&json!({"success": "Status updated successfully."})))
}
