//! `/api/feedback/` endpoints

use super::{sentiment, store};
use crate::error::AppResult;
use crate::http::filters::{admin, authenticated, json_body, query_map, with_state};
use crate::http::pagination::Paginator;
use crate::http::reply;
use crate::http::state::AppState;
use crate::http::validate::Form;
use crate::users::model::User;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::Filter;

pub const COMMENT_MAX: usize = 250;

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let submit = warp::path!("api" / "feedback" / "submit")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(authenticated(state.clone()))
        .and(json_body())
        .then(submit_feedback)
        .map(reply::render);

    let list = warp::path!("api" / "feedback" / "admin" / "all")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(admin(state))
        .and(query_map())
        .then(list_feedback)
        .map(reply::render);

    submit.or(list).unify().boxed()
}

async fn submit_feedback(state: AppState, user: User, body: Value) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let comment = form.required_str("comment");
    form.max_length("comment", &comment, COMMENT_MAX);
    form.finish()?;

    let (label, score) = sentiment::analyze(&comment);
    let id = state.db.write(|tx| {
        store::insert_feedback(tx, user.id, &comment, label, score, Utc::now())
    })?;
    info!(feedback_id = id, sentiment = label.as_str(), score, "Feedback received");
    Ok(reply::created(&json!({ "comment": comment })))
}

async fn list_feedback(
    state: AppState,
    _admin: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let paginator = Paginator::from_query("/api/feedback/admin/all/", &query, &state.config.server)?;
    let page = state.db.read(|conn| {
        let count = store::count_feedback(conn)?;
        paginator.paginate(count, |limit, offset| store::list_feedback(conn, limit, offset))
    })?;
    Ok(reply::ok(&page))
}
