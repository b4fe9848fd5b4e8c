//! Rows handed over by the data-fetch boundary
//!
//! Rows of an additive metric carry their values in `baseline`/`current`.
//! Rows of a ratio metric carry numerators there and set `denominators`.

use crate::metric::{Amounts, Denominators};
use crate::DimensionValues;
use serde::{Deserialize, Serialize};

/// Aggregated baseline/current values of one dimension-value combination
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub values: DimensionValues,
    pub baseline: f64,
    pub current: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominators: Option<Denominators>,
}

impl AggregateRow {
    pub fn new(values: DimensionValues, baseline: f64, current: f64) -> Self {
        Self {
            values,
            baseline,
            current,
            denominators: None,
        }
    }

    /// The zero-dimension row holding the overall totals
    pub fn root(baseline: f64, current: f64) -> Self {
        Self::new(DimensionValues::root(), baseline, current)
    }

    /// Turn the row into a ratio row; `baseline`/`current` become numerators
    pub fn with_denominators(mut self, baseline: f64, current: f64) -> Self {
        self.denominators = Some(Denominators::new(baseline, current));
        self
    }

    pub fn amounts(&self) -> Amounts {
        Amounts {
            baseline: self.baseline,
            current: self.current,
            denominators: self.denominators,
        }
    }
}

/// Marginal aggregate of a single (dimension name, dimension value) pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionRow {
    pub dimension_name: String,
    /// `None` when the source reported a missing value
    pub dimension_value: Option<String>,
    pub baseline: f64,
    pub current: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominators: Option<Denominators>,
}

impl DimensionRow {
    pub fn new(
        dimension_name: impl Into<String>,
        dimension_value: impl Into<String>,
        baseline: f64,
        current: f64,
    ) -> Self {
        Self {
            dimension_name: dimension_name.into(),
            dimension_value: Some(dimension_value.into()),
            baseline,
            current,
            denominators: None,
        }
    }

    /// Turn the row into a ratio row; `baseline`/`current` become numerators
    pub fn with_denominators(mut self, baseline: f64, current: f64) -> Self {
        self.denominators = Some(Denominators::new(baseline, current));
        self
    }

    pub fn amounts(&self) -> Amounts {
        Amounts {
            baseline: self.baseline,
            current: self.current,
            denominators: self.denominators,
        }
    }
}
