//! Error types shared by the attribution crates

use crate::DimensionValues;
use thiserror::Error;

/// Errors raised while validating inputs, building a cube or summarizing it
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RcaError {
    /// A caller-supplied argument is malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required argument is missing
    #[error("Null argument: {0}")]
    NullArgument(String),

    /// Analyzer or cost function configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Fetched rows contain no zero-dimension total
    #[error("Missing root aggregate: fetched rows contain no overall total")]
    MissingRootAggregate,

    /// The same dimension-value combination was fetched more than once
    #[error("Duplicate dimension combination: {0}")]
    DuplicateCombination(DimensionValues),

    /// A fetched value is negative or not finite
    #[error("Invalid value for {values}: {reason}")]
    InvalidValue {
        values: DimensionValues,
        reason: String,
    },

    /// Summary rows do not add back up to the overall total
    #[error("Summary is not additive: expected {expected}, rows sum to {actual}")]
    NonAdditiveSummary { expected: f64, actual: f64 },
}

/// Result type for attribution operations
pub type RcaResult<T> = Result<T, RcaError>;
