//! `/api/face/` endpoints

use super::{decode_image, nearest_match, store, FaceError};
use crate::error::{AppError, AppResult};
use crate::http::filters::{authenticated, json_body, with_state};
use crate::http::reply;
use crate::http::state::AppState;
use crate::http::validate::Form;
use crate::observability::metrics::metrics;
use crate::users::model::User;
use crate::users::store as users;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Filter;

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let upload = warp::path!("api" / "face" / "upload_face")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(authenticated(state.clone()))
        .and(json_body())
        .then(upload_face)
        .map(reply::render);

    let verify = warp::path!("api" / "face" / "verify_face")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .then(verify_face)
        .map(reply::render);

    let delete = warp::path!("api" / "face" / "delete_face")
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(authenticated(state))
        .then(delete_face)
        .map(reply::render);

    upload.or(verify).unify().or(delete).unify().boxed()
}

fn image_field(body: Value) -> AppResult<String> {
    let mut form = Form::new(body)?;
    let image = form.required_str("image");
    form.finish()?;
    Ok(image)
}

async fn embed(state: &AppState, encoded: &str) -> Result<Vec<f32>, FaceError> {
    let image = decode_image(encoded)?;
    state.face.embed(&image).await
}

async fn upload_face(state: AppState, user: User, body: Value) -> AppResult<Response> {
    let encoded = image_field(body)?;
    let embedding = match embed(&state, &encoded).await {
        Ok(embedding) => embedding,
        Err(FaceError::NoFaceDetected) => {
            return Err(AppError::bad_request("Liveness check failed"));
        }
        Err(FaceError::InvalidImage(e)) => {
            return Err(AppError::bad_request(format!("Invalid image data: {e}")));
        }
        Err(e) => return Err(e.into()),
    };

    state
        .db
        .write(|tx| store::upsert(tx, user.id, &embedding, Utc::now()))?;
    info!(user_id = user.id, "Face data registered");
    Ok(reply::ok(&json!({"status": "Face data uploaded successfully"})))
}

fn refusal(status: StatusCode, message: &str) -> Response {
    reply::json(status, &json!({"verified": false, "error": message}))
}

async fn verify_face(state: AppState, body: Value) -> AppResult<Response> {
    let encoded = image_field(body)?;
    let probe = match embed(&state, &encoded).await {
        Ok(embedding) => embedding,
        Err(FaceError::NoFaceDetected) => {
            metrics().face_verification(false);
            return Ok(refusal(StatusCode::BAD_REQUEST, "Liveness check failed"));
        }
        Err(FaceError::InvalidImage(e)) => {
            return Ok(refusal(
                StatusCode::BAD_REQUEST,
                &format!("Invalid image data: {e}"),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let threshold = state.config.face.match_threshold;
    let matched = state.db.read(|conn| {
        let candidates = store::active_embeddings(conn)?;
        match nearest_match(&probe, &candidates, threshold) {
            Some((user_id, _)) => users::find_by_id(conn, *user_id),
            None => Ok(None),
        }
    })?;

    let Some(user) = matched else {
        metrics().face_verification(false);
        return Ok(refusal(StatusCode::UNAUTHORIZED, "Face not recognized."));
    };

    if !user.role.is_staff() {
        metrics().face_verification(false);
        return Ok(refusal(StatusCode::FORBIDDEN, "Unauthorized role"));
    }

    let token = state.tokens.issue_access(&user)?;
    metrics().face_verification(true);
    info!(user_id = user.id, "Face login succeeded");
    Ok(reply::ok(&json!({
        "verified": true,
        "token": token,
        "user_id": user.id,
        "role": user.role,
    })))
}

async fn delete_face(state: AppState, user: User) -> AppResult<Response> {
    let removed = state.db.write(|tx| store::delete(tx, user.id))?;
    let status = if removed {
        "Face data deleted"
    } else {
        "No face data to delete"
    };
    Ok(reply::ok(&json!({ "status": status })))
}
