//! Salary coefficient endpoints

use axum::{
  extract::{Path, State},
  Json,
};
use serde_json::Value;

use super::{created, require_text, success};
use crate::auth::AuthContext;
use crate::db::coefficients::{self, Coefficient, CoefficientInput};
use crate::db::try_lock;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn validate(input: &CoefficientInput) -> ApiResult<()> {
  require_text(&input.name, "Coefficient name is required")?;
  if !input.value.is_finite() {
    return Err(ApiError::validation("Coefficient value must be a number"));
  }
  Ok(())
}

/// GET /api/coefficients
pub async fn list(
  State(state): State<AppState>,
  auth: AuthContext,
) -> ApiResult<Json<Vec<Coefficient>>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(coefficients::list_coefficients(&conn)?))
}

/// GET /api/coefficients/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Coefficient>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  coefficients::get_coefficient(&conn, id)?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Coefficient not found"))
}

/// POST /api/coefficients
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(input): Json<CoefficientInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  validate(&input)?;
  let conn = try_lock(&state.db)?;
  Ok(created(coefficients::create_coefficient(&conn, &input)?))
}

/// PUT /api/coefficients/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(input): Json<CoefficientInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  validate(&input)?;
  let conn = try_lock(&state.db)?;
  if !coefficients::update_coefficient(&conn, id, &input)? {
    return Err(ApiError::not_found("Coefficient not found"));
  }
  Ok(success())
}

/// DELETE /api/coefficients/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  if !coefficients::delete_coefficient(&conn, id)? {
    return Err(ApiError::not_found("Coefficient not found"));
  }
  Ok(success())
}
