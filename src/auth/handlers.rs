//! Authentication handlers for login, register, logout, session status and
//! the caller's own profile.

use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::db::{self as auth_db, NewUser, User, UserChanges};
use super::middleware::{AuthContext, OptionalAuth, SESSION_COOKIE_NAME};
use super::password;
use crate::db::{try_lock, LogOnError};
use crate::error::{ApiError, ApiResult};
use crate::handlers::double_option;
use crate::session::generate_session_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Profile fields a user may change about themselves
#[derive(Deserialize, Default)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let login = form.username.trim();
    if login.is_empty() || form.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let conn = try_lock(&state.db)?;
    let (user, password_hash) = auth_db::find_login(&conn, login)?
        .ok_or_else(invalid_credentials)?;

    if !password::verify_password(&form.password, &password_hash) {
        tracing::info!("Failed login attempt for {}", login);
        return Err(invalid_credentials());
    }

    let hours = state.settings.session_lifetime_hours;
    let session_id = generate_session_id();
    auth_db::create_session(&conn, user.id, &session_id, hours)?;
    auth_db::cleanup_expired_sessions(&conn).log_warn("Failed to clean up expired sessions");
    drop(conn);

    tracing::info!("User {} logged in", user.username);

    let session_cookie = Cookie::build((SESSION_COOKIE_NAME, session_id))
        .path("/")
        .http_only(true)
        .secure(false) // Set to true in production with HTTPS
        .max_age(time::Duration::hours(hours))
        .build();

    Ok((
        jar.add(session_cookie),
        Json(json!({ "success": true, "user": user })),
    ))
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid username or password".to_string())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(ApiError::validation("Username, email and password are required"));
    }
    if !is_valid_username(username) {
        return Err(ApiError::validation(
            "Username may only contain Latin letters, digits and underscores",
        ));
    }

    let password_hash = password::hash_password(&form.password)
        .map_err(|e| ApiError::Internal(format!("password hashing: {}", e)))?;

    let conn = try_lock(&state.db)?;
    if auth_db::username_taken(&conn, username, None)? || auth_db::email_taken(&conn, email, None)? {
        return Err(ApiError::validation(
            "A user with this username or email already exists",
        ));
    }

    let first_name = clean_name(form.first_name);
    let last_name = clean_name(form.last_name);
    let user_id = auth_db::create_user(
        &conn,
        &NewUser {
            username,
            email,
            password_hash: &password_hash,
            first_name: first_name.as_deref(),
            last_name: last_name.as_deref(),
        },
    )?;

    tracing::info!("Registered user {} (id {})", username, user_id);
    Ok(Json(json!({ "success": true, "message": "Registration successful" })))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE_NAME) {
        if let Ok(conn) = try_lock(&state.db) {
            auth_db::delete_session(&conn, session_cookie.value())
                .log_warn("Failed to delete session during logout");
        }
    }

    let session_cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.remove(session_cookie), Json(json!({ "success": true })))
}

/// GET /api/auth - session status with fresh user data
pub async fn status(
    State(state): State<AppState>,
    OptionalAuth(auth): OptionalAuth,
) -> ApiResult<Json<Value>> {
    let user = match auth {
        Some(auth) => {
            let conn = try_lock(&state.db)?;
            auth_db::get_user(&conn, auth.user_id)?
        }
        None => None,
    };
    Ok(Json(match user {
        Some(user) => json!({ "logged_in": true, "user": user }),
        None => json!({ "logged_in": false }),
    }))
}

/// GET /api/profile
pub async fn profile(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<User>> {
    let conn = try_lock(&state.db)?;
    let user = auth_db::get_user(&conn, auth.user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(form): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    let conn = try_lock(&state.db)?;
    let mut changes = identity_changes(
        &conn,
        auth.user_id,
        form.username,
        form.email,
        form.first_name,
        form.last_name,
    )?;

    if let Some(new_password) = form.password.filter(|p| !p.is_empty()) {
        let current = form.current_password.unwrap_or_default();
        if current.is_empty() {
            return Err(ApiError::validation(
                "The current password is required to set a new one",
            ));
        }
        let stored = auth_db::get_password_hash(&conn, auth.user_id)?.unwrap_or_default();
        if !password::verify_password(&current, &stored) {
            return Err(ApiError::validation("Current password is incorrect"));
        }
        let hash = password::hash_password(&new_password)
            .map_err(|e| ApiError::Internal(format!("password hashing: {}", e)))?;
        changes.password_hash = Some(hash);
    }

    if changes.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }
    auth_db::update_user(&conn, auth.user_id, &changes)?;

    let user = auth_db::get_user(&conn, auth.user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}

/// Validate username, email and name edits for `user_id`.
///
/// Shared by the profile endpoint and user administration. Names that are
/// present but blank are cleared.
pub(crate) fn identity_changes(
    conn: &Connection,
    user_id: i64,
    username: Option<String>,
    email: Option<String>,
    first_name: Option<Option<String>>,
    last_name: Option<Option<String>>,
) -> ApiResult<UserChanges> {
    let mut changes = UserChanges::default();

    if let Some(username) = username {
        let username = username.trim().to_string();
        if !is_valid_username(&username) {
            return Err(ApiError::validation(
                "Username may only contain Latin letters, digits and underscores",
            ));
        }
        if auth_db::username_taken(conn, &username, Some(user_id))? {
            return Err(ApiError::validation("A user with this username already exists"));
        }
        changes.username = Some(username);
    }

    if let Some(email) = email {
        let email = email.trim().to_string();
        if email.is_empty() {
            return Err(ApiError::validation("Email must not be empty"));
        }
        if auth_db::email_taken(conn, &email, Some(user_id))? {
            return Err(ApiError::validation("A user with this email already exists"));
        }
        changes.email = Some(email);
    }

    changes.first_name = first_name.map(clean_name);
    changes.last_name = last_name.map(clean_name);
    Ok(changes)
}

/// Trimmed name, or None when blank
fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Validate username: ASCII letters, digits or underscore, at least one
fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::testing::TestEnv;

    #[test]
    fn test_valid_usernames() {
        assert!(is_valid_username("a"));
        assert!(is_valid_username("user123"));
        assert!(is_valid_username("my_user"));
        assert!(is_valid_username("User_Name_123"));
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(!is_valid_username("")); // empty
        assert!(!is_valid_username("user name")); // space
        assert!(!is_valid_username("user-name")); // hyphen
        assert!(!is_valid_username("user@name")); // special char
        assert!(!is_valid_username("иван")); // non-Latin
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name(Some("  Anna ".to_string())).as_deref(), Some("Anna"));
        assert_eq!(clean_name(Some("   ".to_string())), None);
        assert_eq!(clean_name(None), None);
    }

    #[test]
    fn test_identity_changes_rejects_taken_values() {
        let env = TestEnv::new().unwrap();
        let alice = env.add_user("alice", Role::User).unwrap();
        env.add_user("bob", Role::User).unwrap();

        let taken = identity_changes(&env.conn, alice, Some("bob".into()), None, None, None);
        assert!(matches!(taken, Err(ApiError::Validation(_))));

        let email = identity_changes(&env.conn, alice, None, Some("bob@example.com".into()), None, None);
        assert!(matches!(email, Err(ApiError::Validation(_))));

        let own = identity_changes(&env.conn, alice, Some("alice".into()), None, None, None).unwrap();
        assert_eq!(own.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_identity_changes_clears_blank_names() {
        let env = TestEnv::new().unwrap();
        let alice = env.add_user("alice", Role::User).unwrap();

        let changes = identity_changes(
            &env.conn,
            alice,
            None,
            None,
            Some(Some(" ".into())),
            Some(None),
        )
        .unwrap();
        assert_eq!(changes.first_name, Some(None));
        assert_eq!(changes.last_name, Some(None));
        assert!(!changes.is_empty());

        let nothing = identity_changes(&env.conn, alice, None, None, None, None).unwrap();
        assert!(nothing.is_empty());
    }
}
