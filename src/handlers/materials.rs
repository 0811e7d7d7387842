//! Material reference endpoints

use axum::{
  extract::{Path, State},
  Json,
};
use serde_json::Value;

use super::{created, require_text, success};
use crate::auth::AuthContext;
use crate::db::materials::{self, Material, MaterialInput};
use crate::db::try_lock;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn validate(input: &MaterialInput) -> ApiResult<()> {
  require_text(&input.mark, "Material mark is required")?;
  if input.density < 0.0 || input.price < 0.0 {
    return Err(ApiError::validation("Density and price must not be negative"));
  }
  Ok(())
}

/// GET /api/materials
pub async fn list(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<Material>>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(materials::list_materials(&conn)?))
}

/// GET /api/materials/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Material>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  materials::get_material(&conn, id)?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Material not found"))
}

/// POST /api/materials
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(input): Json<MaterialInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  validate(&input)?;
  let conn = try_lock(&state.db)?;
  let id = materials::create_material(&conn, &input)?;
  tracing::info!("{} created material {} ({})", auth.username, id, input.mark.trim());
  Ok(created(id))
}

/// PUT /api/materials/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(input): Json<MaterialInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  validate(&input)?;
  let conn = try_lock(&state.db)?;
  if !materials::update_material(&conn, id, &input)? {
    return Err(ApiError::not_found("Material not found"));
  }
  Ok(success())
}

/// DELETE /api/materials/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  if !materials::delete_material(&conn, id)? {
    return Err(ApiError::not_found("Material not found"));
  }
  Ok(success())
}
