//! Manufacturing operation endpoints

use axum::{
  extract::{Path, State},
  Json,
};
use rusqlite::Connection;
use serde_json::Value;

use super::{created, require_text, success};
use crate::auth::AuthContext;
use crate::db::operations::{self, Operation, OperationInput};
use crate::db::{try_lock, units};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn validate(conn: &Connection, input: &OperationInput) -> ApiResult<()> {
  require_text(&input.number, "Operation number is required")?;
  require_text(&input.description, "Operation description is required")?;
  if input.cost < 0.0 {
    return Err(ApiError::validation("Operation cost must not be negative"));
  }
  if let Some(unit_id) = input.unit_id {
    if units::get_unit(conn, unit_id)?.is_none() {
      return Err(ApiError::validation("Unit not found"));
    }
  }
  Ok(())
}

/// GET /api/operations
pub async fn list(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<Operation>>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(operations::list_operations(&conn)?))
}

/// GET /api/operations/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Operation>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  operations::get_operation(&conn, id)?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Operation not found"))
}

/// POST /api/operations
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(input): Json<OperationInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  validate(&conn, &input)?;
  Ok(created(operations::create_operation(&conn, &input)?))
}

/// PUT /api/operations/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(input): Json<OperationInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  validate(&conn, &input)?;
  if !operations::update_operation(&conn, id, &input)? {
    return Err(ApiError::not_found("Operation not found"));
  }
  Ok(success())
}

/// DELETE /api/operations/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  if !operations::delete_operation(&conn, id)? {
    return Err(ApiError::not_found("Operation not found"));
  }
  Ok(success())
}
