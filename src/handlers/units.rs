//! Unit of measure endpoints

use axum::{
  extract::{Path, State},
  Json,
};
use serde_json::Value;

use super::{created, require_text, success};
use crate::auth::AuthContext;
use crate::db::try_lock;
use crate::db::units::{self, Unit, UnitInput};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/units
pub async fn list(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<Unit>>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(units::list_units(&conn)?))
}

/// GET /api/units/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Unit>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  units::get_unit(&conn, id)?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Unit not found"))
}

/// POST /api/units
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(input): Json<UnitInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  require_text(&input.name, "Unit name is required")?;
  let conn = try_lock(&state.db)?;
  Ok(created(units::create_unit(&conn, &input)?))
}

/// PUT /api/units/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(input): Json<UnitInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  require_text(&input.name, "Unit name is required")?;
  let conn = try_lock(&state.db)?;
  if !units::update_unit(&conn, id, &input)? {
    return Err(ApiError::not_found("Unit not found"));
  }
  Ok(success())
}

/// DELETE /api/units/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  if !units::delete_unit(&conn, id)? {
    return Err(ApiError::not_found("Unit not found"));
  }
  Ok(success())
}
