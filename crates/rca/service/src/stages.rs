//! The stages of a dimension analysis
//!
//! ```text
//! INPUT ─► dimension_marginals ─► dimension_order ─┬─► cube_rows ─► cube ─► summary ─┐
//!                  │                                ├─► gainers_losers ───────────────┤
//!                  └────────────────────────────────┘                                 ▼
//!                                                                                   OUTPUT
//! ```
//!
//! `INPUT` carries the [`Artifact::Request`] and its resolved
//! [`Artifact::Settings`]. Every stage reads what it needs by name from the
//! context and produces a single artifact.

use crate::artifact::{find, Artifact, DimensionOrder, GainersLosers, Marginals};
use crate::report::DimensionAnalysisReport;
use crate::CubeFetcher;
use async_trait::async_trait;
use rca_cube::{
    calculate_sorted_dimension_costs, compute_one_dimension_costs, gainers_and_losers,
    sort_dimensions, Cube, Summarizer,
};
use rca_pipeline::{
    IllegalGraphError, Pipeline, PipelineContext, PipelineError, PipelineGraph, PipelineResult,
    INPUT, OUTPUT,
};
use rca_types::RcaError;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

pub const DIMENSION_MARGINALS: &str = "dimension_marginals";
pub const DIMENSION_ORDER: &str = "dimension_order";
pub const CUBE_ROWS: &str = "cube_rows";
pub const CUBE: &str = "cube";
pub const SUMMARY: &str = "summary";
pub const GAINERS_LOSERS: &str = "gainers_losers";

/// Build and validate the analysis graph
pub fn analysis_graph(
    fetcher: Arc<dyn CubeFetcher>,
) -> Result<PipelineGraph<Artifact>, IllegalGraphError> {
    PipelineGraph::builder()
        .with_stage(DimensionMarginalsStage::new(Arc::clone(&fetcher)))
        .with_stage(DimensionOrderStage::new())
        .with_stage(CubeRowsStage::new(fetcher))
        .with_stage(CubeStage::new())
        .with_stage(SummaryStage::new())
        .with_stage(GainersLosersStage::new())
        .with_stage(ReportStage::new())
        .build()
}

fn names(inputs: &[&str]) -> BTreeSet<String> {
    inputs.iter().map(|name| name.to_string()).collect()
}

// ── Fetching ─────────────────────────────────────────────────────────

/// Overall totals and per-dimension marginals
pub struct DimensionMarginalsStage {
    fetcher: Arc<dyn CubeFetcher>,
    inputs: BTreeSet<String>,
}

impl DimensionMarginalsStage {
    pub fn new(fetcher: Arc<dyn CubeFetcher>) -> Self {
        Self {
            fetcher,
            inputs: names(&[INPUT]),
        }
    }
}

#[async_trait]
impl Pipeline<Artifact> for DimensionMarginalsStage {
    fn output_name(&self) -> &str {
        DIMENSION_MARGINALS
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<Artifact>,
    ) -> Result<PipelineResult<Artifact>, PipelineError> {
        let request = find(&context, INPUT, Artifact::as_request)?;
        let dimensions = request.explorable_dimensions();

        let totals = self
            .fetcher
            .fetch_cube_rows(request, &dimensions, 0)
            .await
            .map_err(PipelineError::failed)?;
        let root = totals
            .iter()
            .find(|row| row.values.is_empty())
            .ok_or_else(|| PipelineError::failed(RcaError::MissingRootAggregate))?;

        let rows = self
            .fetcher
            .fetch_dimension_rows(request, &dimensions)
            .await
            .map_err(PipelineError::failed)?;

        tracing::debug!(
            metric = %request.metric,
            rows = rows.len(),
            kind = %request.metric_kind,
            baseline_total = root.baseline,
            current_total = root.current,
            "Fetched dimension marginals"
        );

        Ok(PipelineResult::single(Artifact::Marginals(Marginals {
            totals: root.amounts(),
            rows,
        })))
    }
}

/// Rows of every combination of the ordered dimensions
pub struct CubeRowsStage {
    fetcher: Arc<dyn CubeFetcher>,
    inputs: BTreeSet<String>,
}

impl CubeRowsStage {
    pub fn new(fetcher: Arc<dyn CubeFetcher>) -> Self {
        Self {
            fetcher,
            inputs: names(&[INPUT, DIMENSION_ORDER]),
        }
    }
}

#[async_trait]
impl Pipeline<Artifact> for CubeRowsStage {
    fn output_name(&self) -> &str {
        CUBE_ROWS
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<Artifact>,
    ) -> Result<PipelineResult<Artifact>, PipelineError> {
        let request = find(&context, INPUT, Artifact::as_request)?;
        let order = find(&context, DIMENSION_ORDER, Artifact::as_dimension_order)?;

        let rows = self
            .fetcher
            .fetch_cube_rows(request, &order.dimensions, order.dimensions.len())
            .await
            .map_err(PipelineError::failed)?;

        Ok(PipelineResult::single(Artifact::CubeRows(rows)))
    }
}

// ── Scoring ──────────────────────────────────────────────────────────

/// Rank dimension values and pick the dimensions to explore
pub struct DimensionOrderStage {
    inputs: BTreeSet<String>,
}

impl DimensionOrderStage {
    pub fn new() -> Self {
        Self {
            inputs: names(&[INPUT, DIMENSION_MARGINALS]),
        }
    }
}

impl Default for DimensionOrderStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pipeline<Artifact> for DimensionOrderStage {
    fn output_name(&self) -> &str {
        DIMENSION_ORDER
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<Artifact>,
    ) -> Result<PipelineResult<Artifact>, PipelineError> {
        let request = find(&context, INPUT, Artifact::as_request)?;
        let settings = find(&context, INPUT, Artifact::as_settings)?;
        let marginals = find(&context, DIMENSION_MARGINALS, Artifact::as_marginals)?;

        let entries = compute_one_dimension_costs(
            &marginals.rows,
            &settings.cost_function,
            &marginals.totals,
        )
        .map_err(PipelineError::failed)?;
        let costs = calculate_sorted_dimension_costs(&entries);

        let explorable = request.explorable_dimensions();
        let ranked = if request.manual_order {
            explorable.truncated(settings.depth)
        } else {
            sort_dimensions(&costs, settings.depth, &request.hierarchies)
                .map_err(PipelineError::failed)?
        };
        // No marginal rows means nothing to rank by
        let dimensions = if ranked.is_empty() {
            explorable.truncated(settings.depth)
        } else {
            ranked
        };

        tracing::info!(
            metric = %request.metric,
            dimensions = %dimensions,
            manual_order = request.manual_order,
            "Chose dimension exploration order"
        );

        Ok(PipelineResult::single(Artifact::DimensionOrder(
            DimensionOrder {
                dimensions,
                costs,
                entries,
            },
        )))
    }
}

/// Build the cube and score every node
pub struct CubeStage {
    inputs: BTreeSet<String>,
}

impl CubeStage {
    pub fn new() -> Self {
        Self {
            inputs: names(&[INPUT, DIMENSION_ORDER, CUBE_ROWS]),
        }
    }
}

impl Default for CubeStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pipeline<Artifact> for CubeStage {
    fn output_name(&self) -> &str {
        CUBE
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<Artifact>,
    ) -> Result<PipelineResult<Artifact>, PipelineError> {
        let settings = find(&context, INPUT, Artifact::as_settings)?;
        let order = find(&context, DIMENSION_ORDER, Artifact::as_dimension_order)?;
        let rows = find(&context, CUBE_ROWS, Artifact::as_cube_rows)?;

        let cube = Cube::build(order.dimensions.clone(), rows.iter().cloned(), settings.depth)
            .map_err(PipelineError::failed)?;
        tracing::info!(
            nodes = cube.len(),
            depth = cube.depth(),
            baseline_total = cube.baseline_total(),
            current_total = cube.current_total(),
            "Built cube"
        );

        let scored = cube.score(settings.cost_function.clone());
        Ok(PipelineResult::single(Artifact::Cube(Box::new(scored))))
    }
}

/// Summarize the scored cube
pub struct SummaryStage {
    inputs: BTreeSet<String>,
}

impl SummaryStage {
    pub fn new() -> Self {
        Self {
            inputs: names(&[INPUT, CUBE]),
        }
    }
}

impl Default for SummaryStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pipeline<Artifact> for SummaryStage {
    fn output_name(&self) -> &str {
        SUMMARY
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<Artifact>,
    ) -> Result<PipelineResult<Artifact>, PipelineError> {
        let settings = find(&context, INPUT, Artifact::as_settings)?;
        let cube = find(&context, CUBE, Artifact::as_cube)?;

        let summary = Summarizer::new(settings.summary.clone())
            .summarize(cube)
            .map_err(PipelineError::failed)?;

        Ok(PipelineResult::single(Artifact::Summary(summary)))
    }
}

/// Top single-dimension movers
pub struct GainersLosersStage {
    inputs: BTreeSet<String>,
}

impl GainersLosersStage {
    pub fn new() -> Self {
        Self {
            inputs: names(&[DIMENSION_MARGINALS, DIMENSION_ORDER]),
        }
    }
}

impl Default for GainersLosersStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pipeline<Artifact> for GainersLosersStage {
    fn output_name(&self) -> &str {
        GAINERS_LOSERS
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<Artifact>,
    ) -> Result<PipelineResult<Artifact>, PipelineError> {
        let marginals = find(&context, DIMENSION_MARGINALS, Artifact::as_marginals)?;
        let order = find(&context, DIMENSION_ORDER, Artifact::as_dimension_order)?;

        let (gainers, losers) = gainers_and_losers(&order.entries, &marginals.totals);

        Ok(PipelineResult::single(Artifact::GainersLosers(
            GainersLosers { gainers, losers },
        )))
    }
}

// ── Report ───────────────────────────────────────────────────────────

/// Assemble the report
///
/// The execution id and timings are only known once the execution ends;
/// the analyzer fills them in.
pub struct ReportStage {
    inputs: BTreeSet<String>,
}

impl ReportStage {
    pub fn new() -> Self {
        Self {
            inputs: names(&[INPUT, DIMENSION_ORDER, SUMMARY, GAINERS_LOSERS]),
        }
    }
}

impl Default for ReportStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pipeline<Artifact> for ReportStage {
    fn output_name(&self) -> &str {
        OUTPUT
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<Artifact>,
    ) -> Result<PipelineResult<Artifact>, PipelineError> {
        let request = find(&context, INPUT, Artifact::as_request)?;
        let settings = find(&context, INPUT, Artifact::as_settings)?;
        let order = find(&context, DIMENSION_ORDER, Artifact::as_dimension_order)?;
        let summary = find(&context, SUMMARY, Artifact::as_summary)?;
        let movers = find(&context, GAINERS_LOSERS, Artifact::as_gainers_losers)?;

        let report = DimensionAnalysisReport {
            execution_id: Uuid::nil(),
            metric: request.metric.clone(),
            current: request.current,
            baseline: request.baseline,
            algorithm: settings.cost_function.name().to_string(),
            summary: summary.clone(),
            gainers: movers.gainers.clone(),
            losers: movers.losers.clone(),
            dimension_costs: order.costs.clone(),
            timings: Vec::new(),
        };

        Ok(PipelineResult::single(Artifact::Report(Box::new(report))))
    }
}
