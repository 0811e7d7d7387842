pub mod costing;
pub mod formula;
pub mod role;

pub use costing::{CoefficientRate, CostBreakdown, CostInputs, OperationCharge};
pub use formula::{Formula, FormulaError};
pub use role::Role;
