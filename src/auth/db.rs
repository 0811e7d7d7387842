//! Auth database operations (users and sessions tables).
//!
//! Both tables live in costing.db; their schema is created by
//! `crate::db::schema`. Password hashes never leave this module except
//! through [`find_login`] and [`get_password_hash`].

use chrono::{Duration, Utc};
use rusqlite::{params, types::Value, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use crate::domain::Role;

/// Account as exposed to handlers and JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to create an account
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

/// Partial update; `None` leaves the column untouched.
///
/// For the name fields `Some(None)` clears the column.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, role, created_at, updated_at";

fn row_to_user(row: &Row) -> Result<User> {
    let role: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: Role::from_str(&role).unwrap_or(Role::Guest),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

// ==================== Users ====================

/// Create a new user, returns the user ID.
///
/// The first account in an empty database becomes super_admin; every
/// later one starts as guest.
pub fn create_user(conn: &Connection, user: &NewUser<'_>) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let existing: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let role = if existing == 0 {
        Role::SuperAdmin
    } else {
        Role::Guest
    };
    let now = Utc::now().to_rfc3339();
    tx.execute(
        r#"INSERT INTO users (username, email, password_hash, first_name, last_name, role, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)"#,
        params![
            user.username,
            user.email,
            user.password_hash,
            user.first_name,
            user.last_name,
            role.as_str(),
            now
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    if role == Role::SuperAdmin {
        tracing::info!("First account {} created as super_admin", user.username);
    }
    Ok(id)
}

/// Look up by username or email, returns the user and their password hash
pub fn find_login(conn: &Connection, login: &str) -> Result<Option<(User, String)>> {
    conn.query_row(
        &format!(
            "SELECT {}, password_hash FROM users WHERE username = ?1 OR email = ?1 ORDER BY id LIMIT 1",
            USER_COLUMNS
        ),
        params![login],
        |row| Ok((row_to_user(row)?, row.get(8)?)),
    )
    .optional()
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        row_to_user,
    )
    .optional()
}

pub fn get_password_hash(conn: &Connection, user_id: i64) -> Result<Option<String>> {
    conn.query_row(
        "SELECT password_hash FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
}

/// All users by id; super admins are left out unless requested
pub fn list_users(conn: &Connection, include_super_admins: bool) -> Result<Vec<User>> {
    let filter = if include_super_admins {
        ""
    } else {
        "WHERE role != 'super_admin'"
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users {} ORDER BY id ASC",
        USER_COLUMNS, filter
    ))?;
    let users = stmt.query_map([], row_to_user)?.collect::<Result<Vec<_>>>()?;
    Ok(users)
}

/// Check if a username is used by anyone other than `except_id`
pub fn username_taken(conn: &Connection, username: &str, except_id: Option<i64>) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id != ?2)",
        params![username, except_id.unwrap_or(0)],
        |row| row.get(0),
    )
}

/// Check if an email is used by anyone other than `except_id`
pub fn email_taken(conn: &Connection, email: &str, except_id: Option<i64>) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id != ?2)",
        params![email, except_id.unwrap_or(0)],
        |row| row.get(0),
    )
}

/// Apply a partial update, returns false if the user does not exist
pub fn update_user(conn: &Connection, user_id: i64, changes: &UserChanges) -> Result<bool> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(username) = &changes.username {
        sets.push("username = ?");
        values.push(Value::Text(username.clone()));
    }
    if let Some(email) = &changes.email {
        sets.push("email = ?");
        values.push(Value::Text(email.clone()));
    }
    if let Some(first_name) = &changes.first_name {
        sets.push("first_name = ?");
        values.push(first_name.clone().map_or(Value::Null, Value::Text));
    }
    if let Some(last_name) = &changes.last_name {
        sets.push("last_name = ?");
        values.push(last_name.clone().map_or(Value::Null, Value::Text));
    }
    if let Some(hash) = &changes.password_hash {
        sets.push("password_hash = ?");
        values.push(Value::Text(hash.clone()));
    }
    if let Some(role) = changes.role {
        sets.push("role = ?");
        values.push(Value::Text(role.as_str().to_string()));
    }

    sets.push("updated_at = ?");
    values.push(Value::Text(Utc::now().to_rfc3339()));
    values.push(Value::Integer(user_id));

    let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
    let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
    Ok(changed > 0)
}

/// Hand the super_admin role to `to_id` along with any other edits to that
/// user; `from_id` becomes admin in the same transaction
pub fn transfer_super_admin(conn: &Connection, from_id: i64, to_id: i64, changes: &UserChanges) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    if !changes.is_empty() {
        update_user(&tx, to_id, changes)?;
    }
    tx.execute(
        "UPDATE users SET role = 'super_admin', updated_at = ?1 WHERE id = ?2",
        params![now, to_id],
    )?;
    tx.execute(
        "UPDATE users SET role = 'admin', updated_at = ?1 WHERE id = ?2",
        params![now, from_id],
    )?;
    tx.commit()?;
    tracing::info!("super_admin transferred from user {} to user {}", from_id, to_id);
    Ok(())
}

/// Delete a user; sessions, chats and calculations go with the foreign keys
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(changed > 0)
}

// ==================== Sessions ====================

/// Create a new session
pub fn create_session(
    conn: &Connection,
    user_id: i64,
    session_id: &str,
    duration_hours: i64,
) -> Result<()> {
    let now = Utc::now();
    let expires = now + Duration::hours(duration_hours);
    conn.execute(
        "INSERT INTO sessions (id, user_id, created_at, expires_at, last_access_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session_id,
            user_id,
            now.to_rfc3339(),
            expires.to_rfc3339(),
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Validate a session and load its user with the current role
pub fn get_session_user(conn: &Connection, session_id: &str) -> Result<Option<User>> {
    let now = Utc::now().to_rfc3339();
    let user = conn
        .query_row(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.role, u.created_at, u.updated_at
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.id = ?1 AND s.expires_at > ?2
            "#,
            params![session_id, now],
            row_to_user,
        )
        .optional()?;

    if user.is_some() {
        if let Err(e) = conn.execute(
            "UPDATE sessions SET last_access_at = ?1 WHERE id = ?2",
            params![now, session_id],
        ) {
            tracing::warn!("Failed to touch session: {}", e);
        }
    }
    Ok(user)
}

/// Delete a session (logout)
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
    Ok(())
}

/// Cleanup expired sessions, returns count of deleted sessions
pub fn cleanup_expired_sessions(conn: &Connection) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let count = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])?;
    Ok(count)
}
