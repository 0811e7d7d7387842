//! Product type endpoints. Formulas are parse-checked before anything is
//! written.

use axum::{
  extract::{Path, State},
  Json,
};
use serde_json::Value;
use std::collections::HashSet;

use super::{created, require_text, success};
use crate::auth::AuthContext;
use crate::db::product_types::{self, ProductType, ProductTypeInput};
use crate::db::try_lock;
use crate::domain::Formula;
use crate::error::{ApiError, ApiResult};
use crate::services::calculator::sanitize_parameter_name;
use crate::state::AppState;

fn validate(input: &ProductTypeInput) -> ApiResult<()> {
  require_text(&input.name, "Product type name is required")?;
  require_text(&input.volume_formula, "Volume formula is required")?;
  require_text(&input.waste_formula, "Waste formula is required")?;

  Formula::parse(&input.volume_formula)
    .map_err(|e| ApiError::validation(format!("Volume formula: {}", e)))?;
  Formula::parse(&input.waste_formula)
    .map_err(|e| ApiError::validation(format!("Waste formula: {}", e)))?;

  let mut seen = HashSet::new();
  for param in &input.parameters {
    let name = param.name.trim();
    if name.is_empty() {
      return Err(ApiError::validation("Parameter name is required"));
    }
    if sanitize_parameter_name(name) != name {
      return Err(ApiError::validation(format!(
        "Parameter name '{}' may only contain Latin letters, digits and underscores",
        name
      )));
    }
    if !seen.insert(name) {
      return Err(ApiError::validation(format!("Duplicate parameter '{}'", name)));
    }
  }
  Ok(())
}

/// GET /api/product-types
pub async fn list(
  State(state): State<AppState>,
  auth: AuthContext,
) -> ApiResult<Json<Vec<ProductType>>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(product_types::list_product_types(&conn)?))
}

/// GET /api/product-types/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<ProductType>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  product_types::get_product_type(&conn, id)?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Product type not found"))
}

/// POST /api/product-types
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(input): Json<ProductTypeInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  validate(&input)?;
  let conn = try_lock(&state.db)?;
  let id = product_types::create_product_type(&conn, &input)?;
  tracing::info!(
    "{} created product type {} with {} parameter(s)",
    auth.username,
    id,
    input.parameters.len()
  );
  Ok(created(id))
}

/// PUT /api/product-types/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(input): Json<ProductTypeInput>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  validate(&input)?;
  let conn = try_lock(&state.db)?;
  if !product_types::update_product_type(&conn, id, &input)? {
    return Err(ApiError::not_found("Product type not found"));
  }
  Ok(success())
}

/// DELETE /api/product-types/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let conn = try_lock(&state.db)?;
  if !product_types::delete_product_type(&conn, id)? {
    return Err(ApiError::not_found("Product type not found"));
  }
  Ok(success())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::product_types::ParameterInput;

  fn input(volume: &str, params: &[&str]) -> ProductTypeInput {
    ProductTypeInput {
      name: "Plate".to_string(),
      description: None,
      volume_formula: volume.to_string(),
      waste_formula: "0".to_string(),
      parameters: params
        .iter()
        .map(|name| ParameterInput {
          name: name.to_string(),
          label: name.to_string(),
          unit: None,
          required: true,
          default_value: None,
          sequence: None,
        })
        .collect(),
    }
  }

  #[test]
  fn test_accepts_valid_product_type() {
    assert!(validate(&input("length * width * height", &["length", "width", "height"])).is_ok());
  }

  #[test]
  fn test_rejects_unparsable_formula() {
    let err = validate(&input("length * (width", &["length", "width"])).unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
  }

  #[test]
  fn test_rejects_bad_parameter_names() {
    assert!(validate(&input("1", &["length", "length"])).is_err());
    assert!(validate(&input("1", &["bad-name"])).is_err());
    assert!(validate(&input("1", &[" "])).is_err());
  }
}
