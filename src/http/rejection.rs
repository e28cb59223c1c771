//! Rejection recovery
//!
//! Turns warp rejections (unmatched routes, bad JSON, oversized bodies and
//! our own permission errors) into JSON responses.

use super::reply;
use crate::error::AppError;
use serde_json::json;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(app_error) = err.find::<AppError>() {
        return Ok(reply::error(app_error));
    }

    let (status, body) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({"detail": "Not found."}))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            json!({"detail": format!("JSON parse error - {e}")}),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({"detail": "Request body too large."}),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({"detail": "Unsupported media type in request."}),
        )
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            json!({"detail": "Invalid query string."}),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"detail": "Method not allowed."}),
        )
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Internal server error"}),
        )
    };

    Ok(reply::json(status, &body))
}
