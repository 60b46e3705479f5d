//! Core error taxonomy.
//!
//! Every core stage fails with one of four kinds. None of them is retried
//! inside the core; the orchestrator attaches the instrument and stage.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Malformed or empty feed input.
    #[error("input error: {0}")]
    Input(String),

    /// Standardization could not produce the required fields.
    #[error("schema error: {0}")]
    Schema(String),

    /// Non-numeric or insufficient data for indicator math.
    #[error("computation error: {0}")]
    Computation(String),

    /// Empty taxonomy/panel or an invalid aggregation level.
    #[error("aggregation error: {0}")]
    Aggregation(String),
}

impl CoreError {
    /// Stable name of the error kind, used in run metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Input(_) => "InputError",
            CoreError::Schema(_) => "SchemaError",
            CoreError::Computation(_) => "ComputationError",
            CoreError::Aggregation(_) => "AggregationError",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(CoreError::Input("x".into()).kind(), "InputError");
        assert_eq!(CoreError::Schema("x".into()).kind(), "SchemaError");
        assert_eq!(CoreError::Computation("x".into()).kind(), "ComputationError");
        assert_eq!(CoreError::Aggregation("x".into()).kind(), "AggregationError");
    }

    #[test]
    fn display_includes_message() {
        let e = CoreError::Schema("missing Close".into());
        assert_eq!(e.to_string(), "schema error: missing Close");
    }
}
