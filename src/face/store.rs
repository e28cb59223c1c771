use super::matcher::{decode_embedding, encode_embedding};
use crate::db::codec::ts;
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

/// Insert or replace the caller's embedding
pub fn upsert(conn: &Connection, user_id: i64, embedding: &[f32], now: DateTime<Utc>) -> AppResult<()> {
    conn.execute(
        "INSERT INTO facial_data (user_id, encoding, created_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(user_id) DO UPDATE SET encoding = excluded.encoding",
        params![user_id, encode_embedding(embedding), ts(now)],
    )?;
    Ok(())
}

/// Returns whether a row was removed
pub fn delete(conn: &Connection, user_id: i64) -> AppResult<bool> {
    let removed = conn.execute("DELETE FROM facial_data WHERE user_id = ?1", params![user_id])?;
    Ok(removed > 0)
}

/// Embeddings of active accounts, keyed by user id
pub fn active_embeddings(conn: &Connection) -> AppResult<Vec<(i64, Vec<f32>)>> {
    let mut stmt = conn.prepare(
        "SELECT f.user_id, f.encoding FROM facial_data f \
         JOIN users u ON u.id = f.user_id WHERE u.is_active = 1 ORDER BY f.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let bytes: Vec<u8> = row.get(1)?;
            Ok((row.get::<_, i64>(0)?, decode_embedding(&bytes)))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
