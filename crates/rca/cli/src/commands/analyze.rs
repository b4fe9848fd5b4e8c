//! `rca analyze`: explain the change recorded in a dataset

use crate::dataset::Dataset;
use crate::error::{CliError, CliResult};
use crate::output::{number, percent, print_structured, print_table, OutputFormat};
use clap::Args;
use colored::Colorize;
use rca_cube::CHANGE_CONTRIBUTION_THRESHOLD_PARAM;
use rca_service::{
    AnalysisConfig, AnalysisError, DimensionAnalysisReport, DimensionAnalyzer,
    InMemoryCubeFetcher,
};
use rca_types::{AnalysisRequest, DimensionCost, GainerLoserRow, SummaryRow};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::Tabled;
use tokio::runtime::Handle;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Dataset file (JSON or YAML) holding the request and its facts
    pub dataset: PathBuf,

    /// Cost function (balanced, contribution, ratio)
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Minimum contribution to the overall change, in percent
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Rows selected per level
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Number of dimensions explored
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Levels the summary explores
    #[arg(long)]
    pub level_count: Option<usize>,

    /// Only select values moving in the same direction as the total
    #[arg(long)]
    pub one_side_error: bool,

    /// Explore dimensions in the order the dataset lists them
    #[arg(long)]
    pub manual_order: bool,

    /// Dimension to leave out (repeatable)
    #[arg(long = "exclude", value_name = "DIMENSION")]
    pub excluded: Vec<String>,

    /// Filter as name=value (repeatable)
    #[arg(long = "filter", value_name = "NAME=VALUE")]
    pub filters: Vec<String>,

    /// Dimension hierarchy, parent first, comma separated (repeatable)
    #[arg(long = "hierarchy", value_name = "A,B")]
    pub hierarchies: Vec<String>,
}

pub async fn execute(
    args: AnalyzeArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> CliResult<()> {
    let config = AnalysisConfig::load(config_path).map_err(AnalysisError::from)?;
    let config = apply_config_overrides(config, &args);

    let dataset = Dataset::load(&args.dataset)?;
    let request = apply_request_options(dataset.request, &args)?;
    tracing::debug!(
        dataset = %args.dataset.display(),
        facts = dataset.facts.len(),
        "Loaded dataset"
    );

    let fetcher = Arc::new(InMemoryCubeFetcher::new(dataset.facts));
    let analyzer = DimensionAnalyzer::new(config, fetcher, Handle::current())?;
    let report = analyzer.analyze(request).await?;

    match format {
        OutputFormat::Table => print_report(&report),
        _ => print_structured(&report, format)?,
    }
    Ok(())
}

fn apply_config_overrides(mut config: AnalysisConfig, args: &AnalyzeArgs) -> AnalysisConfig {
    if let Some(algorithm) = &args.algorithm {
        config.algorithm = algorithm.clone();
    }
    if let Some(threshold) = args.threshold {
        config.params.insert(
            CHANGE_CONTRIBUTION_THRESHOLD_PARAM.to_string(),
            threshold.to_string(),
        );
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }
    if let Some(depth) = args.depth {
        config.max_depth = depth;
    }
    if let Some(level_count) = args.level_count {
        config.level_count = Some(level_count);
    }
    if args.one_side_error {
        config.one_side_error = true;
    }
    config
}

fn apply_request_options(
    mut request: AnalysisRequest,
    args: &AnalyzeArgs,
) -> CliResult<AnalysisRequest> {
    if args.manual_order {
        request = request.with_manual_order(true);
    }
    for dimension in &args.excluded {
        request = request.with_excluded_dimension(dimension.as_str());
    }
    for raw in &args.filters {
        let (name, value) = parse_filter(raw)?;
        request = request.with_filter(name, value);
    }
    for raw in &args.hierarchies {
        let levels: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .collect();
        if levels.len() < 2 {
            return Err(CliError::InvalidArgument(format!(
                "hierarchy '{}' needs at least two dimensions",
                raw
            )));
        }
        request = request.with_hierarchy(levels);
    }
    Ok(request)
}

fn parse_filter(raw: &str) -> CliResult<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(CliError::InvalidArgument(format!(
            "filter '{}' must look like name=value",
            raw
        ))),
    }
}

// ── Table rendering ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Tabled)]
struct SummaryRowView {
    #[tabled(rename = "Values")]
    values: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Change %")]
    percentage_change: String,
    #[tabled(rename = "Contribution %")]
    contribution_to_overall_change: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Others")]
    others: String,
}

impl From<&SummaryRow> for SummaryRowView {
    fn from(row: &SummaryRow) -> Self {
        Self {
            values: row.label_strings().join(" | "),
            baseline: number(row.baseline_value),
            current: number(row.current_value),
            percentage_change: percent(row.percentage_change),
            contribution_to_overall_change: percent(row.contribution_to_overall_change),
            cost: number(row.cost),
            others: row.other_dimension_values_display(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct GainerLoserView {
    #[tabled(rename = "Dimension")]
    dimension: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Change %")]
    percentage_change: String,
    #[tabled(rename = "Contribution %")]
    contribution_to_overall_change: String,
}

impl From<&GainerLoserRow> for GainerLoserView {
    fn from(row: &GainerLoserRow) -> Self {
        Self {
            dimension: row.dimension_name.clone(),
            value: row.dimension_value.clone(),
            baseline: number(row.baseline_value),
            current: number(row.current_value),
            percentage_change: percent(row.percentage_change),
            contribution_to_overall_change: percent(row.contribution_to_overall_change),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct DimensionCostView {
    #[tabled(rename = "Dimension")]
    dimension: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl From<&DimensionCost> for DimensionCostView {
    fn from(cost: &DimensionCost) -> Self {
        Self {
            dimension: cost.name.clone(),
            cost: number(cost.cost),
        }
    }
}

fn print_report(report: &DimensionAnalysisReport) {
    let summary = &report.summary;
    let overall_change = if summary.baseline_total != 0.0 {
        Some(report.change() / summary.baseline_total * 100.0)
    } else {
        None
    };

    println!("{} {}", "Metric:".bold(), report.metric);
    println!("{} {}", "Baseline:".bold(), report.baseline);
    println!("{} {}", "Current:".bold(), report.current);
    println!(
        "{} {} -> {} ({})",
        "Total:".bold(),
        number(summary.baseline_total),
        number(summary.current_total),
        percent(overall_change)
    );
    println!("{} {}", "Algorithm:".bold(), report.algorithm);
    println!("{} {}", "Execution:".bold(), report.execution_id);
    println!();

    print_table(
        &format!("Summary {}", summary.dimensions),
        summary.rows.iter().map(SummaryRowView::from).collect(),
    );
    print_table(
        "Top gainers",
        report.gainers.iter().map(GainerLoserView::from).collect(),
    );
    print_table(
        "Top losers",
        report.losers.iter().map(GainerLoserView::from).collect(),
    );
    print_table(
        "Dimension costs",
        report
            .dimension_costs
            .iter()
            .map(DimensionCostView::from)
            .collect(),
    );
}
