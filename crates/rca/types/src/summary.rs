//! Report types produced by the summarizer

use crate::{Dimensions, MetricKind};
use serde::{Deserialize, Serialize};

/// Label shown for an aggregate row
pub const ALL_LABEL: &str = "(ALL)";
/// Label shown for a residual row
pub const ALL_OTHERS_LABEL: &str = "(ALL)-";
/// Label shown where no finer data exists
pub const EMPTY_LABEL: &str = "";

// ── Labels ───────────────────────────────────────────────────────────

/// One per-level label of a summary row
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SummaryLabel {
    /// A concrete dimension value
    Value(String),
    /// Any value at this level
    All,
    /// Every value at this level except the selected siblings
    AllOthers,
    /// No data below this level
    Empty,
}

impl SummaryLabel {
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl std::fmt::Display for SummaryLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{}", value),
            Self::All => write!(f, "{}", ALL_LABEL),
            Self::AllOthers => write!(f, "{}", ALL_OTHERS_LABEL),
            Self::Empty => write!(f, "{}", EMPTY_LABEL),
        }
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

/// One row of the attribution report
///
/// Percentages are in percent and rounded to four decimals; they are `None`
/// where the denominator is zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub labels: Vec<SummaryLabel>,
    pub baseline_value: f64,
    pub current_value: f64,
    pub cost: f64,
    pub percentage_change: Option<f64>,
    pub contribution_change: Option<f64>,
    pub contribution_to_overall_change: Option<f64>,
    pub size_factor: f64,
    /// Unselected sibling values folded into a residual row
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_dimension_values: Vec<String>,
    /// More sibling values were folded in than are listed
    #[serde(default)]
    pub more_other_dimension_values: bool,
}

impl SummaryRow {
    pub fn change(&self) -> f64 {
        self.current_value - self.baseline_value
    }

    /// True for an `(ALL)-` residual row
    pub fn is_residual(&self) -> bool {
        self.labels.contains(&SummaryLabel::AllOthers)
    }

    /// Labels rendered for display
    pub fn label_strings(&self) -> Vec<String> {
        self.labels.iter().map(ToString::to_string).collect()
    }

    /// Unselected values joined for display, e.g. `"DE, FR, and more..."`
    pub fn other_dimension_values_display(&self) -> String {
        let mut text = self.other_dimension_values.join(", ");
        if self.more_other_dimension_values {
            if !text.is_empty() {
                text.push_str(", ");
            }
            text.push_str("and more...");
        }
        text
    }
}

/// Aggregated cost of a whole dimension
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionCost {
    pub name: String,
    pub cost: f64,
}

impl DimensionCost {
    pub fn new(name: impl Into<String>, cost: f64) -> Self {
        Self {
            name: name.into(),
            cost,
        }
    }
}

/// A single dimension value that moved the metric up or down
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GainerLoserRow {
    pub dimension_name: String,
    pub dimension_value: String,
    pub baseline_value: f64,
    pub current_value: f64,
    pub percentage_change: Option<f64>,
    pub contribution_change: Option<f64>,
    pub contribution_to_overall_change: Option<f64>,
    pub cost: f64,
}

// ── Report ───────────────────────────────────────────────────────────

/// Output of one summarization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Dimensions explored, in exploration order
    pub dimensions: Dimensions,
    /// Ratio reports carry quotients in every value field
    #[serde(default)]
    pub metric_kind: MetricKind,
    pub baseline_total: f64,
    pub current_total: f64,
    /// `current_total / baseline_total`, rounded; `None` for an empty baseline
    pub global_ratio: Option<f64>,
    /// Rows selected per level
    pub top_k: usize,
    /// Nodes in the cube the rows were drawn from
    pub node_count: usize,
    pub rows: Vec<SummaryRow>,
}

impl SummaryReport {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Baseline and current values summed over every row
    ///
    /// Matches the totals for an additive metric; quotients of a ratio
    /// metric do not add up.
    pub fn row_totals(&self) -> (f64, f64) {
        self.rows.iter().fold((0.0, 0.0), |(b, c), row| {
            (b + row.baseline_value, c + row.current_value)
        })
    }
}
