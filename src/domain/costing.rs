//! Cost arithmetic for a single product, independent of storage.

use serde::{Deserialize, Serialize};

/// Orders of at least this many pieces get no small-batch surcharge
pub const FULL_BATCH_QUANTITY: i64 = 5;

/// Quantity used when the client does not send one
pub const DEFAULT_QUANTITY: i64 = 5;

/// Salary multiplier for orders below `FULL_BATCH_QUANTITY`
pub const SMALL_BATCH_COEFFICIENT: f64 = 1.5;

/// Final price multiplier (40% margin)
pub const MARGIN_MULTIPLIER: f64 = 1.40;

/// mm³ × g/cm³ → kg
const MM3_GCM3_PER_KG: f64 = 1_000_000.0;

/// Salary multiplier by order size
pub fn quantity_coefficient(quantity: i64) -> f64 {
  if quantity >= FULL_BATCH_QUANTITY {
    1.0
  } else {
    SMALL_BATCH_COEFFICIENT
  }
}

/// Overhead multiplier by product mass in kg
pub fn mass_coefficient(product_mass: f64) -> f64 {
  if product_mass < 1.0 {
    9.0
  } else if product_mass < 5.0 {
    12.5
  } else if product_mass < 10.0 {
    16.0
  } else {
    15.0
  }
}

/// Convert a volume in mm³ to a mass in kg for a density in g/cm³
pub fn volume_to_mass(volume_mm3: f64, density: f64) -> f64 {
  volume_mm3 * density / MM3_GCM3_PER_KG
}

/// A selected operation with its looked-up base cost
#[derive(Debug, Clone)]
pub struct OperationCharge {
  pub operation_id: i64,
  pub number: String,
  pub description: String,
  pub base_cost: f64,
  pub complexity: f64,
}

/// A stored percentage coefficient applied to salary
#[derive(Debug, Clone)]
pub struct CoefficientRate {
  pub name: String,
  pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationLine {
  pub operation_id: i64,
  pub operation_number: String,
  pub operation_description: String,
  pub operation_cost: f64,
  pub complexity_coefficient: f64,
  pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoefficientLine {
  pub name: String,
  pub value: f64,
  pub amount: f64,
}

/// Everything the cost computation needs once lookups are done
#[derive(Debug, Clone)]
pub struct CostInputs<'a> {
  pub product_volume: f64,
  pub waste_volume: f64,
  pub density: f64,
  pub price_per_kg: f64,
  pub operations: &'a [OperationCharge],
  pub coefficients: &'a [CoefficientRate],
  pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostBreakdown {
  pub quantity_coefficient: f64,
  pub workpiece_volume: f64,
  pub product_volume: f64,
  pub waste_volume: f64,
  pub workpiece_mass: f64,
  pub product_mass: f64,
  pub waste_mass: f64,
  pub material_price_per_kg: f64,
  pub material_cost: f64,
  pub operations: Vec<OperationLine>,
  pub total_operations_cost: f64,
  #[serde(rename = "salary_with_quantity_coef")]
  pub salary: f64,
  pub coefficients: Vec<CoefficientLine>,
  pub coefficients_cost: f64,
  pub mass_coefficient: f64,
  #[serde(rename = "ohr_cost")]
  pub overhead_cost: f64,
  pub total_cost_without_packaging: f64,
  pub total_cost_with_margin: f64,
}

impl CostBreakdown {
  /// False when an input large enough to overflow reached a total
  pub fn is_finite(&self) -> bool {
    self.total_cost_without_packaging.is_finite() && self.total_cost_with_margin.is_finite()
  }
}

/// Run the cost formula over already resolved inputs
pub fn compute(inputs: &CostInputs<'_>) -> CostBreakdown {
  let workpiece_volume = inputs.product_volume + inputs.waste_volume;
  let workpiece_mass = volume_to_mass(workpiece_volume, inputs.density);
  let product_mass = volume_to_mass(inputs.product_volume, inputs.density);
  let waste_mass = volume_to_mass(inputs.waste_volume, inputs.density);

  let material_cost = workpiece_mass * inputs.price_per_kg;

  let operations: Vec<OperationLine> = inputs
    .operations
    .iter()
    .map(|op| OperationLine {
      operation_id: op.operation_id,
      operation_number: op.number.clone(),
      operation_description: op.description.clone(),
      operation_cost: op.base_cost,
      complexity_coefficient: op.complexity,
      total_cost: op.base_cost * op.complexity,
    })
    .collect();
  let total_operations_cost: f64 = operations.iter().map(|line| line.total_cost).sum();

  let quantity_coefficient = quantity_coefficient(inputs.quantity);
  let salary = total_operations_cost * quantity_coefficient;

  let coefficients: Vec<CoefficientLine> = inputs
    .coefficients
    .iter()
    .map(|c| CoefficientLine {
      name: c.name.clone(),
      value: c.value,
      amount: salary * (c.value / 100.0),
    })
    .collect();
  let coefficients_cost: f64 = coefficients.iter().map(|line| line.amount).sum();

  let mass_coefficient = mass_coefficient(product_mass);
  let overhead_cost = ((product_mass * mass_coefficient) + (salary + coefficients_cost)) / 2.0;

  let total_cost_without_packaging = material_cost + salary + coefficients_cost + overhead_cost;
  let total_cost_with_margin = total_cost_without_packaging * MARGIN_MULTIPLIER;

  CostBreakdown {
    quantity_coefficient,
    workpiece_volume,
    product_volume: inputs.product_volume,
    waste_volume: inputs.waste_volume,
    workpiece_mass,
    product_mass,
    waste_mass,
    material_price_per_kg: inputs.price_per_kg,
    material_cost,
    operations,
    total_operations_cost,
    salary,
    coefficients,
    coefficients_cost,
    mass_coefficient,
    overhead_cost,
    total_cost_without_packaging,
    total_cost_with_margin,
  }
}
