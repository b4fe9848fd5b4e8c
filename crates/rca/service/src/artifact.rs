//! Entities passed between analysis stages

use crate::config::AnalysisSettings;
use crate::report::DimensionAnalysisReport;
use rca_cube::{CostEntry, ScoredCube};
use rca_pipeline::{PipelineContext, PipelineError};
use rca_types::{
    AggregateRow, Amounts, AnalysisRequest, DimensionCost, DimensionRow, Dimensions,
    GainerLoserRow, SummaryReport,
};

/// Marginal rows together with the overall totals
#[derive(Clone, Debug)]
pub struct Marginals {
    pub totals: Amounts,
    pub rows: Vec<DimensionRow>,
}

/// The dimensions chosen for exploration and how they were ranked
#[derive(Clone, Debug)]
pub struct DimensionOrder {
    pub dimensions: Dimensions,
    pub costs: Vec<DimensionCost>,
    /// Scored (dimension, value) entries, cost descending
    pub entries: Vec<CostEntry>,
}

/// Top movers on each side
#[derive(Clone, Debug, Default)]
pub struct GainersLosers {
    pub gainers: Vec<GainerLoserRow>,
    pub losers: Vec<GainerLoserRow>,
}

/// Anything a stage can produce or read
#[derive(Clone, Debug)]
pub enum Artifact {
    Request(AnalysisRequest),
    Settings(AnalysisSettings),
    Marginals(Marginals),
    DimensionOrder(DimensionOrder),
    CubeRows(Vec<AggregateRow>),
    Cube(Box<ScoredCube>),
    Summary(SummaryReport),
    GainersLosers(GainersLosers),
    Report(Box<DimensionAnalysisReport>),
}

impl Artifact {
    pub fn as_request(&self) -> Option<&AnalysisRequest> {
        match self {
            Self::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_settings(&self) -> Option<&AnalysisSettings> {
        match self {
            Self::Settings(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn as_marginals(&self) -> Option<&Marginals> {
        match self {
            Self::Marginals(marginals) => Some(marginals),
            _ => None,
        }
    }

    pub fn as_dimension_order(&self) -> Option<&DimensionOrder> {
        match self {
            Self::DimensionOrder(order) => Some(order),
            _ => None,
        }
    }

    pub fn as_cube_rows(&self) -> Option<&[AggregateRow]> {
        match self {
            Self::CubeRows(rows) => Some(rows.as_slice()),
            _ => None,
        }
    }

    pub fn as_cube(&self) -> Option<&ScoredCube> {
        match self {
            Self::Cube(cube) => Some(cube.as_ref()),
            _ => None,
        }
    }

    pub fn as_summary(&self) -> Option<&SummaryReport> {
        match self {
            Self::Summary(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn as_gainers_losers(&self) -> Option<&GainersLosers> {
        match self {
            Self::GainersLosers(movers) => Some(movers),
            _ => None,
        }
    }

    pub fn as_report(&self) -> Option<&DimensionAnalysisReport> {
        match self {
            Self::Report(report) => Some(report.as_ref()),
            _ => None,
        }
    }
}

/// The first entity of `name` that `pick` accepts
pub(crate) fn find<'a, T: ?Sized>(
    context: &'a PipelineContext<Artifact>,
    name: &str,
    pick: impl Fn(&'a Artifact) -> Option<&'a T>,
) -> Result<&'a T, PipelineError> {
    context
        .require(name)?
        .entities()
        .iter()
        .find_map(pick)
        .ok_or_else(|| PipelineError::UnexpectedEntity(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rca_pipeline::INPUT;

    #[test]
    fn test_find_picks_matching_entity() {
        let context = PipelineContext::with_input(vec![
            Artifact::CubeRows(vec![AggregateRow::root(1.0, 2.0)]),
            Artifact::GainersLosers(GainersLosers::default()),
        ]);

        let movers = find(&context, INPUT, Artifact::as_gainers_losers).unwrap();
        assert!(movers.gainers.is_empty());
        let rows = find(&context, INPUT, Artifact::as_cube_rows).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_find_reports_missing_and_unexpected() {
        let context = PipelineContext::with_input(vec![Artifact::CubeRows(Vec::new())]);

        assert!(matches!(
            find(&context, INPUT, Artifact::as_summary),
            Err(PipelineError::UnexpectedEntity(name)) if name == INPUT
        ));
        assert!(matches!(
            find(&context, "summary", Artifact::as_summary),
            Err(PipelineError::MissingInput(_))
        ));
    }
}
