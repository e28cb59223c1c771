//! Response helpers shared by every route module

use crate::error::{AppError, AppResult};
use serde::Serialize;
use serde_json::json;
use tracing::error;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

pub fn ok<T: Serialize>(body: &T) -> Response {
    json(StatusCode::OK, body)
}

pub fn created<T: Serialize>(body: &T) -> Response {
    json(StatusCode::CREATED, body)
}

pub fn detail(message: &str) -> Response {
    ok(&json!({ "detail": message }))
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn error(err: &AppError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    json(status, &err.to_body())
}

/// Final `.map` step of every route: render the handler's outcome
pub fn render(result: AppResult<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => error(&err),
    }
}
