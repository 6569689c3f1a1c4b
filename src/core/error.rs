use std::path::PathBuf;

use thiserror::Error;

use super::types::State;

/// Input rejected before any computation runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculationError {
    #[error("{field} must be a finite number")]
    NonFinite { field: String },
    #[error("{field} must be >= 0")]
    Negative { field: String },
    #[error("propertyValue must be > 0")]
    NonPositivePropertyValue,
    #[error("loanTerm must be > 0 years")]
    NonPositiveLoanTerm,
    #[error("loanTerm must be <= {max} years")]
    LoanTermTooLong { max: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RateTableError {
    #[error("failed to read rate table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rate table JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rate configuration '{id}': {reason}")]
    InvalidConfiguration { id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StampDutyError {
    #[error("{state}: {reason}")]
    InvalidSchedule { state: State, reason: String },
    #[error("baseline jurisdiction {0} has no schedule")]
    MissingBaseline(State),
}
