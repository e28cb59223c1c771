use super::sentiment::SentimentLabel;
use crate::db::codec::{get_ts, ts};
use crate::error::AppResult;
use crate::users::model::UserProfile;
use crate::users::store as users;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

/// Admin view of a comment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackEntry {
    pub id: i64,
    pub user: Option<UserProfile>,
    pub comment: String,
    pub sentiment_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn insert_feedback(
    conn: &Connection,
    user_id: i64,
    comment: &str,
    label: SentimentLabel,
    score: f64,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO feedback (user_id, comment, sentiment_label, sentiment_score, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, comment, label.as_str(), score, ts(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_feedback(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM feedback", [], |row| row.get(0))?)
}

/// Newest first
pub fn list_feedback(conn: &Connection, limit: i64, offset: i64) -> AppResult<Vec<FeedbackEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, comment, sentiment_label, created_at FROM feedback \
         ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map(params![limit, offset], |row| {
            Ok((
                row.get::<_, i64>("id")?,
                row.get::<_, i64>("user_id")?,
                row.get::<_, String>("comment")?,
                row.get::<_, Option<String>>("sentiment_label")?,
                get_ts(row, "created_at")?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, user_id, comment, sentiment_label, created_at)| {
            Ok(FeedbackEntry {
                id,
                user: users::find_by_id(conn, user_id)?.map(|user| UserProfile::from(&user)),
                comment,
                sentiment_label,
                created_at,
            })
        })
        .collect()
}
