//! Authentication extractors and role guards.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use super::db as auth_db;
use crate::db::try_lock;
use crate::domain::Role;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "costing_session";

/// Authenticated request context.
/// Add this as a handler parameter to require authentication.
/// Responds 401 if there is no valid session.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
    /// Role as stored right now, not as it was at login
    pub role: Role,
}

fn unauthorized() -> Response {
    ApiError::Unauthorized("Authentication required".to_string()).into_response()
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| unauthorized())?;

        let session_id = jar
            .get(SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .ok_or_else(unauthorized)?;

        let conn = try_lock(&state.db).map_err(|e| ApiError::from(e).into_response())?;
        let user = auth_db::get_session_user(&conn, &session_id)
            .map_err(|e| ApiError::from(e).into_response())?
            .ok_or_else(unauthorized)?;

        Ok(AuthContext {
            user_id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

impl AuthContext {
    /// Reference data, calculator and saved calculations
    pub fn require_references(&self) -> ApiResult<()> {
        if self.role.can_access_references() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator access required"))
        }
    }

    pub fn require_super_admin(&self) -> ApiResult<()> {
        if self.role.is_super_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Super administrator access required"))
        }
    }

    pub fn is_support(&self) -> bool {
        self.role.is_support()
    }
}

/// Optional authentication extractor.
/// Returns Some(AuthContext) if authenticated, None otherwise.
pub struct OptionalAuth(pub Option<AuthContext>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AuthContext::from_request_parts(parts, state).await {
            Ok(auth) => Ok(OptionalAuth(Some(auth))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            user_id: 1,
            username: "someone".to_string(),
            role,
        }
    }

    #[test]
    fn test_guards_follow_role_order() {
        assert!(ctx(Role::Guest).require_references().is_err());
        assert!(ctx(Role::User).require_references().is_ok());
        assert!(ctx(Role::User).require_admin().is_err());
        assert!(ctx(Role::Admin).require_admin().is_ok());
        assert!(ctx(Role::Admin).require_super_admin().is_err());
        assert!(ctx(Role::SuperAdmin).require_super_admin().is_ok());
    }

    #[test]
    fn test_support_staff() {
        assert!(!ctx(Role::User).is_support());
        assert!(ctx(Role::Admin).is_support());
        assert!(ctx(Role::SuperAdmin).is_support());
    }
}
