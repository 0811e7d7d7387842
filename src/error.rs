//! HTTP error type shared by every JSON handler.
//!
//! Handlers return `Result<_, ApiError>` and use `?` on database, lock,
//! formula and costing errors. The body is always `{"error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::db::DbLockError;
use crate::domain::FormulaError;
use crate::services::calculator::CostingError;
use crate::services::migrations::MigrationError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Input data is invalid. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// No valid session. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but the role is not enough. HTTP 403.
    #[error("{0}")]
    Forbidden(String),

    /// HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Detail is logged, never sent. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Internal(format!("database: {}", e))
    }
}

impl From<DbLockError> for ApiError {
    fn from(e: DbLockError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Internal(format!("json: {}", e))
    }
}

impl From<askama::Error> for ApiError {
    fn from(e: askama::Error) -> Self {
        ApiError::Internal(format!("template: {}", e))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(format!("io: {}", e))
    }
}

impl From<FormulaError> for ApiError {
    fn from(e: FormulaError) -> Self {
        ApiError::Validation(format!("Formula error: {}", e))
    }
}

impl From<MigrationError> for ApiError {
    fn from(e: MigrationError) -> Self {
        match e {
            MigrationError::Io { .. } | MigrationError::Database(_) => {
                ApiError::Internal(e.to_string())
            }
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<CostingError> for ApiError {
    fn from(e: CostingError) -> Self {
        match e {
            CostingError::MaterialNotFound(_) | CostingError::ProductTypeNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            CostingError::Database(inner) => inner.into(),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn costing_errors_map_to_http() {
        let missing: ApiError = CostingError::MaterialNotFound(4).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let param: ApiError = CostingError::MissingParameter("Length".into()).into();
        assert_eq!(param.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(param.to_string(), "Missing required parameter: Length");

        let formula: ApiError = FormulaError::DivisionByZero.into();
        assert_eq!(formula.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_errors_are_internal() {
        let err: ApiError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
