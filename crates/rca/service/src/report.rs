//! The result of one dimension analysis

use rca_pipeline::StageTiming;
use rca_types::{DimensionCost, GainerLoserRow, SummaryReport, TimeInterval};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything one analysis found out about a metric change
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionAnalysisReport {
    /// Identifier of the pipeline execution that produced the report
    pub execution_id: Uuid,
    pub metric: String,
    pub current: TimeInterval,
    pub baseline: TimeInterval,
    /// Name of the cost function used
    pub algorithm: String,
    pub summary: SummaryReport,
    pub gainers: Vec<GainerLoserRow>,
    pub losers: Vec<GainerLoserRow>,
    /// Cost of every explorable dimension, highest first
    pub dimension_costs: Vec<DimensionCost>,
    /// Time spent per stage, in completion order
    #[serde(default)]
    pub timings: Vec<StageTiming>,
}

impl DimensionAnalysisReport {
    /// Overall change of the metric
    pub fn change(&self) -> f64 {
        self.summary.current_total - self.summary.baseline_total
    }

    pub fn row_count(&self) -> usize {
        self.summary.row_count()
    }
}
