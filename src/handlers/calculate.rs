//! POST /api/calculate: run the calculator, optionally saving the result.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::AuthContext;
use crate::db::calculations::{self, CalculationWrite};
use crate::db::try_lock;
use crate::error::{ApiError, ApiResult};
use crate::services::calculator::{self, CalculationInput, CalculationResult, SelectedOperation};
use crate::state::AppState;

/// Calculator request body, shared with the saved-calculation endpoints
#[derive(Debug, Deserialize)]
pub struct CalculationRequest {
  #[serde(default)]
  pub product_name: String,
  #[serde(default)]
  pub material_id: Option<i64>,
  #[serde(default)]
  pub product_type_id: Option<i64>,
  #[serde(default)]
  pub parameters: Map<String, Value>,
  #[serde(default)]
  pub operations: Vec<SelectedOperation>,
  #[serde(default)]
  pub quantity: Option<i64>,
  /// Only read by /api/calculate
  #[serde(default)]
  pub save: bool,
}

impl CalculationRequest {
  /// Check required fields and borrow the request as calculator input
  pub fn input(&self) -> ApiResult<CalculationInput<'_>> {
    let product_name = self.product_name.trim();
    let (material_id, product_type_id) = match (self.material_id, self.product_type_id) {
      (Some(m), Some(p)) if !product_name.is_empty() => (m, p),
      _ => {
        return Err(ApiError::validation(
          "Product name, material and product type are required",
        ))
      }
    };
    Ok(CalculationInput {
      product_name,
      material_id,
      product_type_id,
      parameters: &self.parameters,
      operations: &self.operations,
      quantity: calculator::effective_quantity(self.quantity),
    })
  }
}

/// Stored column values for a computed result
pub(crate) struct Serialized {
  pub parameters: String,
  pub operations: String,
  pub result: String,
}

impl Serialized {
  pub fn new(request: &CalculationRequest, result: &CalculationResult) -> ApiResult<Self> {
    Ok(Self {
      parameters: serde_json::to_string(&result.parameters)?,
      operations: serde_json::to_string(&request.operations)?,
      result: serde_json::to_string(result)?,
    })
  }

  pub fn write<'a>(&'a self, input: &'a CalculationInput<'a>) -> CalculationWrite<'a> {
    CalculationWrite {
      product_name: input.product_name,
      material_id: input.material_id,
      product_type_id: input.product_type_id,
      parameters_json: &self.parameters,
      operations_json: &self.operations,
      result_json: &self.result,
      quantity: input.quantity,
    }
  }
}

/// POST /api/calculate
pub async fn calculate(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(request): Json<CalculationRequest>,
) -> ApiResult<Json<Value>> {
  auth.require_references()?;
  let input = request.input()?;

  let conn = try_lock(&state.db)?;
  let result = calculator::calculate(&conn, &input)?;

  let calculation_id = if request.save {
    let stored = Serialized::new(&request, &result)?;
    let id = calculations::insert_calculation(&conn, auth.user_id, &stored.write(&input))?;
    tracing::info!("{} saved calculation {}", auth.username, id);
    Some(id)
  } else {
    None
  };
  drop(conn);

  let mut body = serde_json::to_value(&result)?;
  if let (Some(id), Value::Object(map)) = (calculation_id, &mut body) {
    map.insert("calculation_id".to_string(), Value::from(id));
  }
  Ok(Json(body))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(body: &str) -> CalculationRequest {
    serde_json::from_str(body).unwrap()
  }

  #[test]
  fn test_input_requires_ids_and_name() {
    assert!(request(r#"{"material_id": 1, "product_type_id": 2}"#).input().is_err());
    assert!(request(r#"{"product_name": "Plate", "material_id": 1}"#).input().is_err());

    let ok = request(r#"{"product_name": " Plate ", "material_id": 1, "product_type_id": 2}"#);
    let input = ok.input().unwrap();
    assert_eq!(input.product_name, "Plate");
    assert_eq!(input.quantity, crate::domain::costing::DEFAULT_QUANTITY);
  }

  #[test]
  fn test_operations_default_complexity() {
    let req = request(r#"{"operations": [{"operation_id": 3}]}"#);
    assert_eq!(req.operations[0].complexity_coefficient, 1.0);
    assert!(!req.save);
  }
}
