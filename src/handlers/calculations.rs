//! Saved calculations: paginated listing, detail, and server-side
//! recomputation on create and update.

use axum::{
  extract::{Path, Query, State},
  Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::calculate::{CalculationRequest, Serialized};
use super::{created, success};
use crate::auth::AuthContext;
use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::db::calculations::{self, CalculationRecord};
use crate::db::{product_types, try_lock};
use crate::error::{ApiError, ApiResult};
use crate::services::calculator;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
  pub page: Option<i64>,
  pub limit: Option<i64>,
}

impl ListQuery {
  /// Page clamped to at least 1, limit to 1..=MAX_PAGE_LIMIT
  fn bounds(&self) -> (i64, i64) {
    let page = self.page.unwrap_or(1).max(1);
    let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    (page, limit)
  }
}

/// Rows to skip; pages past the end saturate and come back empty
fn offset(page: i64, limit: i64) -> i64 {
  (page - 1).saturating_mul(limit)
}

fn page_count(total: i64, limit: i64) -> i64 {
  (total + limit - 1) / limit
}

/// GET /api/calculations
pub async fn list(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let (page, limit) = query.bounds();

  let conn = try_lock(&state.db)?;
  let total = calculations::count_calculations(&conn)?;
  let rows = calculations::list_calculations(&conn, limit, offset(page, limit))?;

  Ok(Json(json!({
    "calculations": rows,
    "total": total,
    "page": page,
    "limit": limit,
    "pages": page_count(total, limit),
  })))
}

/// Record with its JSON columns decoded
pub(crate) fn decode(record: &CalculationRecord) -> ApiResult<Value> {
  let parameters: Value = serde_json::from_str(&record.parameters)?;
  let operations: Value = serde_json::from_str(&record.operations)?;
  let result: Value = serde_json::from_str(&record.result)?;
  Ok(json!({
    "id": record.id,
    "user_id": record.user_id,
    "product_name": record.product_name,
    "material_id": record.material_id,
    "product_type_id": record.product_type_id,
    "material_name": record.material_name,
    "product_type_name": record.product_type_name,
    "parameters": parameters,
    "operations": operations,
    "result": result,
    "quantity": record.quantity,
    "created_at": record.created_at,
    "updated_at": record.updated_at,
  }))
}

/// GET /api/calculations/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  let record = calculations::get_calculation(&conn, id)?
    .ok_or_else(|| ApiError::not_found("Calculation not found"))?;

  let labels = match record.product_type_id {
    Some(type_id) => product_types::get_parameter_labels(&conn, type_id)?,
    None => Default::default(),
  };
  drop(conn);

  let mut body = decode(&record)?;
  if let Value::Object(map) = &mut body {
    map.insert("parameter_labels".to_string(), json!(labels));
  }
  Ok(Json(body))
}

/// POST /api/calculations
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(request): Json<CalculationRequest>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let input = request.input()?;

  let conn = try_lock(&state.db)?;
  let result = calculator::calculate(&conn, &input)?;
  let stored = Serialized::new(&request, &result)?;
  let id = calculations::insert_calculation(&conn, auth.user_id, &stored.write(&input))?;

  tracing::info!("{} saved calculation {}", auth.username, id);
  Ok(created(id))
}

/// PUT /api/calculations/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(request): Json<CalculationRequest>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let input = request.input()?;

  let conn = try_lock(&state.db)?;
  if calculations::get_calculation(&conn, id)?.is_none() {
    return Err(ApiError::not_found("Calculation not found"));
  }
  let result = calculator::calculate(&conn, &input)?;
  let stored = Serialized::new(&request, &result)?;
  calculations::update_calculation(&conn, id, &stored.write(&input))?;
  Ok(success())
}

/// DELETE /api/calculations/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  if !calculations::delete_calculation(&conn, id)? {
    return Err(ApiError::not_found("Calculation not found"));
  }
  Ok(success())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bounds_clamp() {
    let q = |page, limit| ListQuery { page, limit }.bounds();
    assert_eq!(q(None, None), (1, DEFAULT_PAGE_LIMIT));
    assert_eq!(q(Some(0), Some(0)), (1, 1));
    assert_eq!(q(Some(-3), Some(500)), (1, MAX_PAGE_LIMIT));
    assert_eq!(q(Some(4), Some(20)), (4, 20));
  }

  #[test]
  fn test_offset_saturates() {
    assert_eq!(offset(1, 50), 0);
    assert_eq!(offset(3, 20), 40);
    assert_eq!(offset(i64::MAX, MAX_PAGE_LIMIT), i64::MAX);
  }

  #[test]
  fn test_page_count_rounds_up() {
    assert_eq!(page_count(0, 50), 0);
    assert_eq!(page_count(50, 50), 1);
    assert_eq!(page_count(51, 50), 2);
  }
}
