//! JSON endpoints, one module per resource.

pub mod calculate;
pub mod calculations;
pub mod coefficients;
pub mod export;
pub mod materials;
pub mod migrations;
pub mod operations;
pub mod product_types;
pub mod support;
pub mod units;
pub mod users;

use axum::Json;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};

/// GET /health
pub async fn health() -> &'static str {
  "ok"
}

/// `{"success": true, "id": ..}` for create endpoints
pub fn created(id: i64) -> Json<Value> {
  Json(json!({ "success": true, "id": id }))
}

/// `{"success": true}` for update and delete endpoints
pub fn success() -> Json<Value> {
  Json(json!({ "success": true }))
}

/// Reject a blank required text field
pub fn require_text(value: &str, message: &str) -> ApiResult<()> {
  if value.trim().is_empty() {
    Err(ApiError::validation(message))
  } else {
    Ok(())
  }
}

/// Distinguish an absent field (`None`) from an explicit null (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Deserialize)]
  struct Patch {
    #[serde(default, deserialize_with = "double_option")]
    name: Option<Option<String>>,
  }

  #[test]
  fn test_double_option_distinguishes_null() {
    let absent: Patch = serde_json::from_str("{}").unwrap();
    assert_eq!(absent.name, None);
    let null: Patch = serde_json::from_str(r#"{"name": null}"#).unwrap();
    assert_eq!(null.name, Some(None));
    let set: Patch = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
    assert_eq!(set.name, Some(Some("x".to_string())));
  }

  #[test]
  fn test_require_text() {
    assert!(require_text("  ", "Name is required").is_err());
    assert!(require_text("Plate", "Name is required").is_ok());
  }
}
