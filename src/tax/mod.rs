pub mod cgt;
pub mod matcher;
pub mod uk;

pub use cgt::{calculate, CalculatorResult, CgtError, DisposalResult, TaxYearSummary};
pub use uk::{RateTable, TaxYear, TaxYearRates};
