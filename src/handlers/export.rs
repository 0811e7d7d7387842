//! Printable HTML export of a saved calculation.

use askama::Template;
use axum::{
  extract::{Path, Query, State},
  http::header,
  response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::auth::AuthContext;
use crate::db::calculations::{self, CalculationRecord};
use crate::db::{product_types, try_lock};
use crate::domain::costing::OperationLine;
use crate::domain::CostBreakdown;
use crate::error::{ApiError, ApiResult};
use crate::filters;
use crate::services::calculator::CalculationResult;
use crate::state::AppState;

pub struct ParameterRow {
  pub label: String,
  pub value: f64,
}

#[derive(Template)]
#[template(path = "export/calculation.html")]
pub struct CalculationExportTemplate {
  pub product_name: String,
  pub material_name: String,
  pub product_type_name: String,
  pub created_at: String,
  pub parameters: Vec<ParameterRow>,
  pub breakdown: CostBreakdown,
  pub operations: Vec<OperationLine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
  #[serde(default)]
  pub download: Option<String>,
}

impl ExportQuery {
  fn wants_download(&self) -> bool {
    matches!(self.download.as_deref(), Some("1") | Some("true"))
  }
}

/// `d.m.Y H:i`, or the raw value if it is not RFC 3339
fn display_date(raw: &str) -> String {
  chrono::DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.format("%d.%m.%Y %H:%M").to_string())
    .unwrap_or_else(|_| raw.to_string())
}

fn build_template(
  record: CalculationRecord,
  labels: &BTreeMap<String, String>,
) -> ApiResult<CalculationExportTemplate> {
  let result: CalculationResult = serde_json::from_str(&record.result)?;

  let parameters = result
    .parameters
    .iter()
    .map(|(name, value)| ParameterRow {
      label: labels.get(name).cloned().unwrap_or_else(|| name.clone()),
      value: *value,
    })
    .collect();

  Ok(CalculationExportTemplate {
    product_name: record.product_name,
    material_name: record.material_name.unwrap_or(result.material_name),
    product_type_name: record.product_type_name.unwrap_or(result.product_type_name),
    created_at: display_date(&record.created_at),
    parameters,
    operations: result.breakdown.operations.clone(),
    breakdown: result.breakdown,
  })
}

/// Attachment file name, percent-encoded for the header
fn download_filename(record_id: i64, product_name: &str) -> String {
  let name = format!("Калькуляция_{}_{}.html", product_name, record_id);
  urlencoding::encode(&name).into_owned()
}

/// GET /api/calculations/{id}/export
pub async fn export_calculation(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
  auth.require_references()?;

  let conn = try_lock(&state.db)?;
  let record = calculations::get_calculation(&conn, id)?
    .filter(|record| record.user_id == auth.user_id)
    .ok_or_else(|| ApiError::not_found("Calculation not found"))?;
  let labels = match record.product_type_id {
    Some(type_id) => product_types::get_parameter_labels(&conn, type_id)?,
    None => BTreeMap::new(),
  };
  drop(conn);

  let record_id = record.id;
  let template = build_template(record, &labels)?;
  let html = Html(template.render()?);

  if query.wants_download() {
    let disposition = format!(
      "attachment; filename*=UTF-8''{}",
      download_filename(record_id, &template.product_name)
    );
    Ok(([(header::CONTENT_DISPOSITION, disposition)], html).into_response())
  } else {
    Ok(html.into_response())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::costing::{self, CoefficientRate, CostInputs, OperationCharge};

  fn record() -> CalculationRecord {
    let breakdown = costing::compute(&CostInputs {
      product_volume: 200_000.0,
      waste_volume: 50_000.0,
      density: 1.7,
      price_per_kg: 300.0,
      operations: &[OperationCharge {
        operation_id: 1,
        number: "010".to_string(),
        description: "Turning".to_string(),
        base_cost: 100.0,
        complexity: 1.5,
      }],
      coefficients: &[CoefficientRate {
        name: "Premium".to_string(),
        value: 20.0,
      }],
      quantity: 5,
    });
    let result = CalculationResult {
      product_name: "Tube <A>".to_string(),
      material_name: "MPG-6".to_string(),
      product_type_name: "Tube".to_string(),
      parameters: BTreeMap::from([("length".to_string(), 1234.5)]),
      quantity: 5,
      breakdown,
    };
    CalculationRecord {
      id: 7,
      user_id: 1,
      product_name: "Tube <A>".to_string(),
      material_id: Some(1),
      product_type_id: Some(1),
      material_name: None,
      product_type_name: Some("Tube".to_string()),
      parameters: "{}".to_string(),
      operations: "[]".to_string(),
      result: serde_json::to_string(&result).unwrap(),
      quantity: 5,
      created_at: "2025-03-04T09:05:00+00:00".to_string(),
      updated_at: None,
    }
  }

  #[test]
  fn test_renders_labels_and_formatted_numbers() {
    let labels = BTreeMap::from([("length".to_string(), "Длина".to_string())]);
    let html = build_template(record(), &labels).unwrap().render().unwrap();

    assert!(html.contains("Калькуляция себестоимости"));
    assert!(html.contains("04.03.2025 09:05"));
    assert!(html.contains("Длина"));
    assert!(html.contains("1 234.50"));
    assert!(html.contains("250 000.00 мм³"));
    assert!(html.contains("0.4250 кг"));
    assert!(html.contains("MPG-6"));
    assert!(html.contains("Tube &#60;A&#62;") || html.contains("Tube &lt;A&gt;"));
  }

  #[test]
  fn test_unknown_parameter_keeps_its_name() {
    let html = build_template(record(), &BTreeMap::new()).unwrap().render().unwrap();
    assert!(html.contains("length"));
  }

  #[test]
  fn test_display_date_falls_back_to_raw() {
    assert_eq!(display_date("yesterday"), "yesterday");
  }

  #[test]
  fn test_download_filename_is_encoded() {
    let name = download_filename(3, "Tube A");
    assert!(name.ends_with("_3.html"));
    assert!(name.contains("Tube%20A"));
    assert!(!name.contains(' '));
  }

  #[test]
  fn test_download_flag() {
    let q = |v: Option<&str>| ExportQuery { download: v.map(String::from) }.wants_download();
    assert!(q(Some("1")));
    assert!(!q(Some("0")));
    assert!(!q(None));
  }
}
