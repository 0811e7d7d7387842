//! Calculator orchestration: reference lookups, parameter binding, formula
//! evaluation, then the pure costing arithmetic in `domain::costing`.
//!
//! Nothing here writes to the database.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::db::{coefficients, materials, operations, product_types};
use crate::domain::costing::{self, CostBreakdown, CostInputs, OperationCharge, DEFAULT_QUANTITY};
use crate::domain::{Formula, FormulaError};

#[derive(Error, Debug)]
pub enum CostingError {
    #[error("Material not found")]
    MaterialNotFound(i64),

    #[error("Product type not found")]
    ProductTypeNotFound(i64),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter {0} is not a number")]
    InvalidParameter(String),

    #[error("Cannot evaluate {formula} formula: {source}")]
    Formula {
        formula: &'static str,
        source: FormulaError,
    },

    #[error("Calculated cost is not a finite number")]
    NonFiniteCost,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// One operation picked for the product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedOperation {
    pub operation_id: i64,
    #[serde(default = "default_complexity")]
    pub complexity_coefficient: f64,
}

fn default_complexity() -> f64 {
    1.0
}

/// Everything the calculator needs from a request
#[derive(Debug, Clone)]
pub struct CalculationInput<'a> {
    pub product_name: &'a str,
    pub material_id: i64,
    pub product_type_id: i64,
    pub parameters: &'a Map<String, Value>,
    pub operations: &'a [SelectedOperation],
    pub quantity: i64,
}

/// Full calculation output, also the stored `result` snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationResult {
    pub product_name: String,
    pub material_name: String,
    pub product_type_name: String,
    /// Bound values after defaults were applied
    pub parameters: BTreeMap<String, f64>,
    pub quantity: i64,
    #[serde(flatten)]
    pub breakdown: CostBreakdown,
}

/// Quantity as sent by the client: absent means the default, and anything
/// below one is raised to one
pub fn effective_quantity(quantity: Option<i64>) -> i64 {
    quantity.map(|q| q.max(1)).unwrap_or(DEFAULT_QUANTITY)
}

/// Parameter names may only contain ASCII letters, digits and underscores
pub fn sanitize_parameter_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn parameter_value(name: &str, value: &Value) -> Result<Option<f64>, CostingError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| CostingError::InvalidParameter(name.to_string())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| CostingError::InvalidParameter(name.to_string())),
        _ => Err(CostingError::InvalidParameter(name.to_string())),
    }
}

/// Bind submitted parameters to variables.
///
/// Every submitted key is bound under its sanitized name. Declared
/// parameters that are missing take their default; a required one without
/// a default is an error naming its label.
pub fn resolve_parameters(
    declared: &[product_types::ProductTypeParameter],
    submitted: &Map<String, Value>,
) -> Result<BTreeMap<String, f64>, CostingError> {
    let mut bound = BTreeMap::new();
    for (key, value) in submitted {
        let name = sanitize_parameter_name(key);
        if name.is_empty() {
            continue;
        }
        if let Some(v) = parameter_value(&name, value)? {
            bound.insert(name, v);
        }
    }

    for param in declared {
        if bound.contains_key(&param.name) {
            continue;
        }
        match param.default_value {
            Some(default) => {
                bound.insert(param.name.clone(), default);
            }
            None if param.required => {
                return Err(CostingError::MissingParameter(param.label.clone()));
            }
            None => {}
        }
    }
    Ok(bound)
}

fn evaluate_formula(
    formula: &'static str,
    source: &str,
    vars: &HashMap<String, f64>,
) -> Result<f64, CostingError> {
    Formula::parse(source)
        .and_then(|f| f.evaluate(vars))
        .map_err(|source| CostingError::Formula { formula, source })
}

/// Look up the selected operations, skipping ids that no longer exist
fn operation_charges(
    conn: &Connection,
    selected: &[SelectedOperation],
) -> Result<Vec<OperationCharge>, CostingError> {
    let mut charges = Vec::with_capacity(selected.len());
    for op in selected {
        match operations::get_operation(conn, op.operation_id)? {
            Some(operation) => charges.push(OperationCharge {
                operation_id: operation.id,
                number: operation.number,
                description: operation.description,
                base_cost: operation.cost,
                complexity: op.complexity_coefficient,
            }),
            None => tracing::warn!("Skipping unknown operation {}", op.operation_id),
        }
    }
    Ok(charges)
}

/// Run a full calculation against the current reference data
pub fn calculate(conn: &Connection, input: &CalculationInput<'_>) -> Result<CalculationResult, CostingError> {
    let material = materials::get_material(conn, input.material_id)?
        .ok_or(CostingError::MaterialNotFound(input.material_id))?;
    let product_type = product_types::get_product_type(conn, input.product_type_id)?
        .ok_or(CostingError::ProductTypeNotFound(input.product_type_id))?;

    let parameters = resolve_parameters(&product_type.parameters, input.parameters)?;
    let vars: HashMap<String, f64> = parameters.iter().map(|(k, v)| (k.clone(), *v)).collect();

    let product_volume = evaluate_formula("volume", &product_type.volume_formula, &vars)?;
    let waste_volume = evaluate_formula("waste", &product_type.waste_formula, &vars)?;

    let charges = operation_charges(conn, input.operations)?;
    let rates = coefficients::list_rates(conn)?;

    let breakdown = costing::compute(&CostInputs {
        product_volume,
        waste_volume,
        density: material.density,
        price_per_kg: material.price,
        operations: &charges,
        coefficients: &rates,
        quantity: input.quantity,
    });
    if !breakdown.is_finite() {
        return Err(CostingError::NonFiniteCost);
    }

    tracing::debug!(
        "Calculated {} ({}): total {:.2}",
        input.product_name,
        product_type.name,
        breakdown.total_cost_without_packaging
    );

    Ok(CalculationResult {
        product_name: input.product_name.to_string(),
        material_name: material.mark,
        product_type_name: product_type.name,
        parameters,
        quantity: input.quantity,
        breakdown,
    })
}
