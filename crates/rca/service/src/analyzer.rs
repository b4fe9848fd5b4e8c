//! Entry point for dimension analysis

use crate::artifact::Artifact;
use crate::config::AnalysisConfig;
use crate::report::DimensionAnalysisReport;
use crate::stages::analysis_graph;
use crate::{AnalysisError, AnalysisResult, CubeFetcher};
use rca_pipeline::RcaFramework;
use rca_types::AnalysisRequest;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Explains metric changes by dimension
///
/// The analysis graph is validated once, at construction; every call to
/// [`DimensionAnalyzer::analyze`] runs it with a fresh context.
pub struct DimensionAnalyzer {
    config: AnalysisConfig,
    framework: RcaFramework<Artifact>,
}

impl DimensionAnalyzer {
    /// Create an analyzer whose stages run on `handle`
    pub fn new(
        config: AnalysisConfig,
        fetcher: Arc<dyn CubeFetcher>,
        handle: Handle,
    ) -> AnalysisResult<Self> {
        let cost_function = config.validate().map_err(AnalysisError::Config)?;
        let graph = analysis_graph(fetcher)?;

        tracing::info!(
            algorithm = cost_function.name(),
            threshold = cost_function.change_contribution_threshold(),
            max_depth = config.max_depth,
            top_k = config.top_k,
            stages = graph.len(),
            "Dimension analyzer ready"
        );

        Ok(Self {
            config,
            framework: RcaFramework::new(graph, handle),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Stage names in execution order
    pub fn stage_order(&self) -> &[String] {
        self.framework.graph().topological_order()
    }

    /// Run one analysis
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult<DimensionAnalysisReport> {
        request.validate().map_err(AnalysisError::InvalidRequest)?;
        let settings = self
            .config
            .settings_for(&request)
            .map_err(AnalysisError::InvalidRequest)?;

        tracing::info!(
            metric = %request.metric,
            current = %request.current,
            baseline = %request.baseline,
            depth = settings.depth,
            top_k = settings.summary.top_k,
            "Starting dimension analysis"
        );

        let execution = self
            .framework
            .run(vec![Artifact::Request(request), Artifact::Settings(settings)])
            .await?;

        let mut report = execution
            .output()
            .entities()
            .iter()
            .find_map(Artifact::as_report)
            .cloned()
            .ok_or(AnalysisError::MissingReport)?;
        report.execution_id = execution.execution_id();
        report.timings = execution.timings().to_vec();

        tracing::info!(
            execution_id = %report.execution_id,
            metric = %report.metric,
            rows = report.row_count(),
            gainers = report.gainers.len(),
            losers = report.losers.len(),
            "Dimension analysis completed"
        );

        Ok(report)
    }
}
