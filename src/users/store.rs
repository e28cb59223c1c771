//! User persistence

use super::model::{NewUser, Role, User};
use crate::db::codec::{get_opt_ts, get_ts, to_from_sql_error, ts};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, role, \
                            is_active, agreed_to_terms_at, date_joined, last_login";

pub(crate) fn row_to_user(row: &Row<'_>) -> Result<User, rusqlite::Error> {
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        username: row.get("username")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        password_hash: row.get("password_hash")?,
        role: Role::parse(&role).ok_or_else(|| {
            to_from_sql_error(std::io::Error::other(format!("unknown role: {role}")))
        })?,
        is_active: row.get("is_active")?,
        agreed_to_terms_at: get_opt_ts(row, "agreed_to_terms_at")?,
        date_joined: get_ts(row, "date_joined")?,
        last_login: get_opt_ts(row, "last_login")?,
    })
}

pub fn email_taken(conn: &Connection, email: &str, except_id: Option<i64>) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?1 AND id != COALESCE(?2, -1)",
            params![email, except_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_user(conn: &Connection, new: &NewUser, now: DateTime<Utc>) -> AppResult<User> {
    if email_taken(conn, &new.email, None)? {
        return Err(AppError::field(
            "email",
            "user with this email already exists.",
        ));
    }

    conn.execute(
        "INSERT INTO users (email, username, first_name, last_name, password_hash, role, \
         is_active, agreed_to_terms_at, date_joined) \
         VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.email,
            new.first_name,
            new.last_name,
            new.password_hash,
            new.role.as_str(),
            new.is_active,
            new.agreed_to_terms_at.map(ts),
            ts(now),
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or_else(|| AppError::internal("inserted user vanished"))
}

pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()?)
}

/// Case-insensitive lookup; the column collates NOCASE
pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email.trim()],
            row_to_user,
        )
        .optional()?)
}

pub fn count_users(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

pub fn update_profile(
    conn: &Connection,
    id: i64,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> AppResult<()> {
    if email_taken(conn, email, Some(id))? {
        return Err(AppError::field(
            "email",
            "user with this email already exists.",
        ));
    }
    conn.execute(
        "UPDATE users SET email = ?2, username = ?2, first_name = ?3, last_name = ?4 \
         WHERE id = ?1",
        params![id, email, first_name, last_name],
    )?;
    Ok(())
}

pub fn set_password(conn: &Connection, id: i64, password_hash: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![id, password_hash],
    )?;
    Ok(())
}

pub fn set_active(conn: &Connection, id: i64, active: bool) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET is_active = ?2 WHERE id = ?1",
        params![id, active],
    )?;
    Ok(())
}

pub fn touch_last_login(conn: &Connection, id: i64, now: DateTime<Utc>) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET last_login = ?2 WHERE id = ?1",
        params![id, ts(now)],
    )?;
    Ok(())
}

pub fn count_by_role(conn: &Connection, role: Role) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![role.as_str()],
        |row| row.get(0),
    )?)
}

/// Staff page ordered by first name
pub fn list_staff(conn: &Connection, limit: i64, offset: i64) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = 'staff' \
         ORDER BY first_name, id LIMIT ?1 OFFSET ?2"
    ))?;
    let users = stmt
        .query_map(params![limit, offset], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn find_staff(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    Ok(find_by_id(conn, id)?.filter(|user| user.role == Role::Staff))
}

pub fn delete_user(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn ids_by_role(conn: &Connection, roles: &[Role]) -> AppResult<Vec<i64>> {
    let mut ids = Vec::new();
    let mut stmt = conn.prepare("SELECT id FROM users WHERE role = ?1 ORDER BY id")?;
    for role in roles {
        let found = stmt
            .query_map(params![role.as_str()], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids.extend(found);
    }
    Ok(ids)
}

/// Timestamp of the most recent login, for link-token fingerprints
pub fn last_login_text(user: &User) -> String {
    user.last_login.map(ts).unwrap_or_default()
}
