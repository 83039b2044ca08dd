// Error types for the conversion, formatting and validation layers
// Storage and CSV code uses anyhow on top of these

use thiserror::Error;

use crate::validation::ValidationIssue;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FuelError {
    /// Unit code not recognised by any converter
    #[error("unknown unit code '{0}'")]
    UnknownUnit(String),

    /// Both codes are valid but measure different quantities
    #[error("cannot convert {from} to {to}")]
    IncompatibleUnits { from: String, to: String },

    /// Zero, negative or non-finite consumption passed to the reciprocal converter
    #[error("consumption value {0} cannot be converted (must be a positive finite number)")]
    InvalidConsumption(f64),

    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),

    #[error("price precision must be 2 or 3, got {0}")]
    InvalidPrecision(u8),

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid date pattern '{0}'")]
    InvalidDatePattern(String),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<ValidationIssue>),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{} ({})", i.field, i.code))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, FuelError>;
