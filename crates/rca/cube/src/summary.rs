//! Top-K summarization of a scored cube
//!
//! Selection walks the cube level by level. At each level every child of the
//! current frontier is a candidate; insignificant candidates are dropped and
//! the `top_k` best survivors become the next frontier. Only selected nodes
//! are expanded.
//!
//! Rows are then emitted depth-first from the root:
//!
//! - a node on the last explored level gets its own row;
//! - a node without children gets a row whose remaining labels are `EMPTY`;
//! - a node whose children were all passed over gets a row labelled `ALL`
//!   below its own values;
//! - otherwise its selected children are emitted, followed by one `ALL_OTHERS`
//!   row carrying whatever the selected children do not account for.
//!
//! The emitted rows always add back up to the root: values for an additive
//! metric, numerators and denominators for a ratio. A residual that would
//! have to be negative means the fetched rows were not additive, and fails
//! the summary.

use crate::cost::{snap_to_zero, EPSILON};
use crate::cube::{compare_candidates, CubeNode, NodeId, ScoredCube};
use rca_types::{
    Amounts, MetricKind, RcaError, RcaResult, SummaryLabel, SummaryReport, SummaryRow,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Most sibling values listed on a residual row
pub const MAX_OTHER_DIMENSION_VALUES: usize = 10;

// ── Presentation helpers ─────────────────────────────────────────────

/// Round to four decimals
pub fn round_up(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `(current - baseline) / baseline`, in percent
pub fn percentage_change(baseline: f64, current: f64) -> Option<f64> {
    if baseline != 0.0 {
        Some(round_up((current - baseline) / baseline * 100.0))
    } else {
        None
    }
}

/// Change of the row's share of the total, in percentage points
pub fn contribution_change(
    baseline: f64,
    current: f64,
    baseline_total: f64,
    current_total: f64,
) -> Option<f64> {
    if baseline_total != 0.0 && current_total != 0.0 {
        Some(round_up(
            (current / current_total - baseline / baseline_total) * 100.0,
        ))
    } else {
        None
    }
}

/// The row's change as a share of the overall change, in percent
pub fn contribution_to_overall_change_percent(
    baseline: f64,
    current: f64,
    baseline_total: f64,
    current_total: f64,
) -> Option<f64> {
    let global_change = (current_total - baseline_total).abs();
    if baseline_total != 0.0 && global_change != 0.0 {
        Some(round_up((current - baseline) / global_change * 100.0))
    } else {
        None
    }
}

/// [`contribution_to_overall_change_percent`] for either metric kind
///
/// Ratio rows are weighted by their share of the population.
pub fn overall_change_percent(amounts: &Amounts, totals: &Amounts) -> Option<f64> {
    let (baseline_total, current_total) = (totals.baseline_value(), totals.current_value());
    let global_change = (current_total - baseline_total).abs();
    if baseline_total == 0.0 || global_change == 0.0 {
        return None;
    }
    let weight = match amounts.kind() {
        MetricKind::Additive => 1.0,
        MetricKind::Ratio if totals.size() != 0.0 => amounts.size() / totals.size(),
        MetricKind::Ratio => 0.0,
    };
    Some(round_up(
        weight * (amounts.current_value() - amounts.baseline_value()) / global_change * 100.0,
    ))
}

// ── Configuration ────────────────────────────────────────────────────

/// Summarizer settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Rows selected per level
    pub top_k: usize,
    /// Only select nodes that moved in the same direction as the total
    pub one_side_error: bool,
    /// Levels to explore; `None` explores the whole cube
    pub level_count: Option<usize>,
}

impl SummaryConfig {
    pub fn new(top_k: usize) -> RcaResult<Self> {
        if top_k == 0 {
            return Err(RcaError::Configuration(
                "summary size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            top_k,
            one_side_error: false,
            level_count: None,
        })
    }

    pub fn with_one_side_error(mut self, one_side_error: bool) -> Self {
        self.one_side_error = one_side_error;
        self
    }

    pub fn with_level_count(mut self, level_count: usize) -> Self {
        self.level_count = Some(level_count);
        self
    }
}

// ── Summarizer ───────────────────────────────────────────────────────

/// Greedy top-K summarizer
#[derive(Clone, Debug)]
pub struct Summarizer {
    config: SummaryConfig,
}

impl Summarizer {
    pub fn new(config: SummaryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Select and label the nodes that best explain the overall change
    pub fn summarize(&self, cube: &ScoredCube) -> RcaResult<SummaryReport> {
        let levels = match self.config.level_count {
            Some(count) if count > 0 => count.min(cube.depth()),
            _ => cube.depth(),
        };

        let ranks = self.select(cube, levels);
        let mut emitter = RowEmitter {
            cube,
            ranks: &ranks,
            levels,
            rows: Vec::new(),
            emitted: Amounts::default(),
        };
        emitter.emit(cube.root_id())?;
        check_additivity(&emitter.emitted, cube.totals(), emitter.rows.len())?;
        let rows = emitter.rows;

        let baseline_total = cube.baseline_total();
        let current_total = cube.current_total();

        tracing::info!(
            top_k = self.config.top_k,
            levels,
            selected = ranks.len(),
            rows = rows.len(),
            "Summarized cube"
        );

        Ok(SummaryReport {
            dimensions: cube.dimensions().truncated(levels),
            metric_kind: cube.metric_kind(),
            baseline_total,
            current_total,
            global_ratio: if baseline_total != 0.0 {
                Some(round_up(current_total / baseline_total))
            } else {
                None
            },
            top_k: self.config.top_k,
            node_count: cube.len(),
            rows,
        })
    }

    /// Selected node ids mapped to their selection rank within a level
    fn select(&self, cube: &ScoredCube, levels: usize) -> HashMap<NodeId, usize> {
        let root_side = cube.root().side();
        let mut ranks = HashMap::new();
        let mut frontier = vec![cube.root_id()];

        for level in 1..=levels {
            let mut candidates: Vec<NodeId> = frontier
                .iter()
                .flat_map(|id| cube.node(*id).children().iter().copied())
                .filter(|id| cube.is_significant(*id))
                .filter(|id| !self.config.one_side_error || cube.node(*id).side() == root_side)
                .collect();
            candidates.sort_by(|a, b| compare_candidates(cube.node(*a), cube.node(*b)));
            candidates.truncate(self.config.top_k);

            tracing::debug!(
                level,
                selected = candidates.len(),
                "Selected candidates"
            );
            if candidates.is_empty() {
                break;
            }
            for (rank, id) in candidates.iter().enumerate() {
                ranks.insert(*id, rank);
            }
            frontier = candidates;
        }
        ranks
    }
}

// ── Row emission ─────────────────────────────────────────────────────

struct RowEmitter<'a> {
    cube: &'a ScoredCube,
    ranks: &'a HashMap<NodeId, usize>,
    levels: usize,
    rows: Vec<SummaryRow>,
    /// Sum of the amounts of every row pushed so far
    emitted: Amounts,
}

impl RowEmitter<'_> {
    fn emit(&mut self, id: NodeId) -> RcaResult<()> {
        let cube = self.cube;
        let ranks = self.ranks;
        let node = cube.node(id);

        if node.level() >= self.levels {
            self.push_node(node, None);
            return Ok(());
        }
        if node.children().is_empty() {
            self.push_node(node, Some(SummaryLabel::Empty));
            return Ok(());
        }

        let mut selected: Vec<NodeId> = node
            .children()
            .iter()
            .copied()
            .filter(|child| ranks.contains_key(child))
            .collect();
        if selected.is_empty() {
            self.push_node(node, Some(SummaryLabel::All));
            return Ok(());
        }
        selected.sort_by_key(|child| ranks[child]);

        let mut rest = *node.amounts();
        for child in selected {
            rest -= *cube.node(child).amounts();
            self.emit(child)?;
        }
        let rest = remainder(node, rest)?;

        let unselected: Vec<&str> = node
            .children()
            .iter()
            .filter(|child| !ranks.contains_key(child))
            .filter_map(|child| cube.node(*child).values().last())
            .collect();
        if unselected.is_empty() && rest.is_zero() {
            return Ok(());
        }

        let mut labels: Vec<SummaryLabel> = node.values().iter().map(SummaryLabel::value).collect();
        labels.push(SummaryLabel::AllOthers);
        let cost = cube.cost_function().cost(&rest, cube.totals());
        let row = self.push_row(labels, Some(SummaryLabel::All), &rest, cost);
        row.more_other_dimension_values = unselected.len() > MAX_OTHER_DIMENSION_VALUES;
        row.other_dimension_values = unselected
            .into_iter()
            .take(MAX_OTHER_DIMENSION_VALUES)
            .map(str::to_string)
            .collect();
        Ok(())
    }

    fn push_node(&mut self, node: &CubeNode, filler: Option<SummaryLabel>) {
        let labels = node.values().iter().map(SummaryLabel::value).collect();
        self.push_row(labels, filler, node.amounts(), node.cost());
    }

    fn push_row(
        &mut self,
        mut labels: Vec<SummaryLabel>,
        filler: Option<SummaryLabel>,
        amounts: &Amounts,
        cost: f64,
    ) -> &mut SummaryRow {
        if let Some(filler) = filler {
            labels.resize(self.levels.max(labels.len()), filler);
        }

        let cube = self.cube;
        let totals = cube.totals();
        let (baseline, current) = (amounts.baseline_value(), amounts.current_value());
        let total_size = totals.size();
        self.emitted += *amounts;
        self.rows.push(SummaryRow {
            labels,
            baseline_value: baseline,
            current_value: current,
            cost,
            percentage_change: percentage_change(baseline, current),
            contribution_change: contribution_change(
                baseline,
                current,
                totals.baseline_value(),
                totals.current_value(),
            ),
            contribution_to_overall_change: overall_change_percent(amounts, totals),
            size_factor: if total_size != 0.0 {
                round_up(amounts.size() / total_size)
            } else {
                0.0
            },
            other_dimension_values: Vec::new(),
            more_other_dimension_values: false,
        });
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }
}

/// What `node` holds beyond its selected children
///
/// Float noise snaps to zero. A clearly negative component means a fetched
/// aggregate is smaller than the children fetched with it.
fn remainder(node: &CubeNode, rest: Amounts) -> RcaResult<Amounts> {
    let whole = node.amounts().components();
    for ((name, value), (_, total)) in rest.components().into_iter().zip(whole) {
        if value < -EPSILON * total.abs().max(1.0) {
            return Err(RcaError::InvalidValue {
                values: node.values().clone(),
                reason: format!(
                    "{} left after the selected children is negative ({})",
                    name, value
                ),
            });
        }
    }
    Ok(rest.map(|value| if value <= 0.0 { 0.0 } else { snap_to_zero(value) }))
}

/// Every component of the emitted rows adds back up to the root
fn check_additivity(emitted: &Amounts, totals: &Amounts, row_count: usize) -> RcaResult<()> {
    let slack = EPSILON * row_count as f64;
    for ((_, actual), (_, expected)) in emitted.components().into_iter().zip(totals.components()) {
        if (actual - expected).abs() > slack + EPSILON * expected.abs() {
            return Err(RcaError::NonAdditiveSummary { expected, actual });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{ContributionCostFunction, CostFunction, RatioCostFunction};
    use crate::cube::Cube;
    use rca_types::{AggregateRow, DimensionValues, Dimensions};

    fn row(values: &[&str], baseline: f64, current: f64) -> AggregateRow {
        AggregateRow::new(DimensionValues::new(values.iter().copied()), baseline, current)
    }

    fn scored(dimensions: &[&str], rows: Vec<AggregateRow>) -> ScoredCube {
        let dims = Dimensions::new(dimensions.iter().copied()).unwrap();
        let depth = dims.len();
        Cube::build(dims, rows, depth)
            .unwrap()
            .score(CostFunction::default())
    }

    fn summarize(cube: &ScoredCube, top_k: usize) -> SummaryReport {
        Summarizer::new(SummaryConfig::new(top_k).unwrap())
            .summarize(cube)
            .unwrap()
    }

    fn labels(row: &SummaryRow) -> Vec<String> {
        row.label_strings()
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(round_up(1.234567), 1.2346);
        assert_eq!(percentage_change(10.0, 2.0), Some(-80.0));
        assert_eq!(percentage_change(0.0, 2.0), None);
        assert_eq!(contribution_change(10.0, 2.0, 100.0, 60.0), Some(-6.6667));
        assert_eq!(
            contribution_to_overall_change_percent(10.0, 2.0, 100.0, 60.0),
            Some(-20.0)
        );
        assert_eq!(contribution_to_overall_change_percent(1.0, 1.0, 5.0, 5.0), None);
        assert_eq!(
            overall_change_percent(&Amounts::additive(10.0, 2.0), &Amounts::additive(100.0, 60.0)),
            Some(-20.0)
        );
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        assert!(matches!(
            SummaryConfig::new(0),
            Err(RcaError::Configuration(_))
        ));
    }

    #[test]
    fn test_disproportionate_drop_ranks_first() {
        let cube = scored(
            &["X"],
            vec![
                row(&[], 100.0, 60.0),
                row(&["a"], 10.0, 2.0),
                row(&["b"], 90.0, 58.0),
            ],
        );
        let report = summarize(&cube, 1);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(labels(&report.rows[0]), vec!["a"]);
        assert_eq!(report.rows[0].percentage_change, Some(-80.0));
        assert_eq!(labels(&report.rows[1]), vec!["(ALL)-"]);
        assert_eq!(report.rows[1].baseline_value, 90.0);
        assert_eq!(report.rows[1].current_value, 58.0);
        assert_eq!(report.rows[1].other_dimension_values, vec!["b"]);
        assert_eq!(report.global_ratio, Some(0.6));
        assert_eq!(report.row_totals(), (100.0, 60.0));
    }

    #[test]
    fn test_two_level_summary() {
        let cube = scored(
            &["country", "page"],
            vec![
                row(&[], 30.0, 45.0),
                row(&["US"], 20.0, 30.0),
                row(&["IN"], 10.0, 15.0),
                row(&["US", "page1"], 8.0, 10.0),
                row(&["US", "page2"], 12.0, 20.0),
                row(&["IN", "page1"], 10.0, 15.0),
            ],
        );
        let report = summarize(&cube, 1);
        let rendered: Vec<Vec<String>> = report.rows.iter().map(labels).collect();

        // US and IN both grew 50%, so both cost 0; US wins on |change|.
        // Under US, page2 carries 8 of 15 changed units on 12 of 30.
        assert_eq!(
            rendered,
            vec![
                vec!["US".to_string(), "page2".to_string()],
                vec!["US".to_string(), "(ALL)-".to_string()],
                vec!["(ALL)-".to_string(), "(ALL)".to_string()],
            ]
        );
        assert_eq!(report.rows[1].other_dimension_values, vec!["page1"]);
        assert_eq!(report.rows[2].other_dimension_values, vec!["IN"]);
        assert_eq!(report.row_totals(), (30.0, 45.0));
        assert_eq!(report.node_count, 6);
    }

    #[test]
    fn test_no_children_yields_empty_labels() {
        let cube = scored(&["country", "page"], vec![row(&[], 30.0, 45.0)]);
        let report = summarize(&cube, 3);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(
            report.rows[0].labels,
            vec![SummaryLabel::Empty, SummaryLabel::Empty]
        );
    }

    #[test]
    fn test_nothing_significant_yields_all_row() {
        let cube = scored(
            &["country"],
            vec![
                row(&[], 100.0, 100.0),
                row(&["US"], 50.0, 50.0),
                row(&["IN"], 50.0, 50.0),
            ],
        );
        let report = summarize(&cube, 2);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].labels, vec![SummaryLabel::All]);
        assert_eq!(report.rows[0].contribution_to_overall_change, None);
    }

    #[test]
    fn test_all_children_selected_has_no_residual() {
        let cube = scored(
            &["country"],
            vec![
                row(&[], 100.0, 60.0),
                row(&["a"], 10.0, 2.0),
                row(&["b"], 90.0, 58.0),
            ],
        );
        let report = summarize(&cube, 5);
        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().all(|r| !r.is_residual()));
        assert_eq!(report.row_totals(), (100.0, 60.0));
    }

    #[test]
    fn test_one_side_error_skips_opposite_movers() {
        let rows = vec![
            row(&[], 100.0, 90.0),
            row(&["up"], 10.0, 40.0),
            row(&["down1"], 45.0, 25.0),
            row(&["down2"], 45.0, 25.0),
        ];
        let cube = Cube::build(Dimensions::new(["country"]).unwrap(), rows, 1)
            .unwrap()
            .score(CostFunction::Contribution(ContributionCostFunction::default()));

        let both = summarize(&cube, 1);
        assert_eq!(labels(&both.rows[0]), vec!["up"]);

        let one_side = Summarizer::new(SummaryConfig::new(1).unwrap().with_one_side_error(true))
            .summarize(&cube)
            .unwrap();
        assert_eq!(labels(&one_side.rows[0]), vec!["down1"]);
        assert_eq!(one_side.row_totals(), (100.0, 90.0));
    }

    #[test]
    fn test_level_count_limits_exploration() {
        let cube = scored(
            &["country", "page"],
            vec![
                row(&[], 30.0, 45.0),
                row(&["US", "page1"], 8.0, 10.0),
                row(&["US", "page2"], 12.0, 20.0),
                row(&["IN", "page1"], 10.0, 15.0),
            ],
        );
        let report = Summarizer::new(SummaryConfig::new(1).unwrap().with_level_count(1))
            .summarize(&cube)
            .unwrap();
        assert_eq!(report.dimensions.names(), &["country"]);
        assert!(report.rows.iter().all(|r| r.labels.len() == 1));
        assert_eq!(report.row_totals(), (30.0, 45.0));
    }

    #[test]
    fn test_residual_lists_at_most_ten_values() {
        let mut rows = vec![row(&[], 0.0, 0.0), row(&["big"], 100.0, 10.0)];
        let mut baseline = 100.0;
        let mut current = 10.0;
        for i in 0..12 {
            let name = format!("v{:02}", i);
            rows.push(row(&[name.as_str()], 10.0, 10.0));
            baseline += 10.0;
            current += 10.0;
        }
        rows[0] = row(&[], baseline, current);

        let report = summarize(&scored(&["country"], rows), 1);
        let residual = report.rows.iter().find(|r| r.is_residual()).unwrap();
        assert_eq!(residual.other_dimension_values.len(), MAX_OTHER_DIMENSION_VALUES);
        assert!(residual.more_other_dimension_values);
        assert_eq!(residual.baseline_value, 120.0);
    }

    #[test]
    fn test_negative_residual_is_rejected() {
        // The fetched root is smaller than US and IN together
        let cube = scored(
            &["country"],
            vec![
                row(&[], 30.0, 45.0),
                row(&["US"], 25.0, 30.0),
                row(&["IN"], 10.0, 5.0),
            ],
        );
        let result = Summarizer::new(SummaryConfig::new(2).unwrap()).summarize(&cube);
        match result {
            Err(RcaError::InvalidValue { values, reason }) => {
                assert!(values.is_empty());
                assert!(reason.contains("baseline"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_residual_near_one_is_kept_exact() {
        let cube = scored(
            &["X"],
            vec![
                row(&[], 11.0000004, 1.0),
                row(&["a"], 10.0, 0.0),
                row(&["b"], 1.0000004, 1.0),
            ],
        );
        let report = summarize(&cube, 1);
        assert_eq!(labels(&report.rows[0]), vec!["a"]);

        let residual = &report.rows[1];
        assert!(residual.is_residual());
        assert_ne!(residual.baseline_value, 1.0);
        assert!((residual.baseline_value - 1.0000004).abs() < 1e-9);
        assert_eq!(residual.current_value, 1.0);
    }

    fn ratio_row(values: &[&str], numerators: (f64, f64), denominators: (f64, f64)) -> AggregateRow {
        row(values, numerators.0, numerators.1).with_denominators(denominators.0, denominators.1)
    }

    fn scored_ratio(rows: Vec<AggregateRow>) -> ScoredCube {
        Cube::build(Dimensions::new(["country"]).unwrap(), rows, 1)
            .unwrap()
            .score(CostFunction::Ratio(RatioCostFunction::default()))
    }

    #[test]
    fn test_ratio_summary_splits_numerators_and_denominators() {
        // Error rate 5% -> 10%; a jumped to 30% while b slipped to 3.3%
        let cube = scored_ratio(vec![
            ratio_row(&[], (10.0, 20.0), (200.0, 200.0)),
            ratio_row(&["a"], (5.0, 15.0), (100.0, 50.0)),
            ratio_row(&["b"], (5.0, 5.0), (100.0, 150.0)),
        ]);
        let report = summarize(&cube, 1);

        assert_eq!(report.metric_kind, MetricKind::Ratio);
        assert_eq!(report.baseline_total, 0.05);
        assert_eq!(report.current_total, 0.1);
        assert_eq!(report.global_ratio, Some(2.0));

        assert_eq!(report.rows.len(), 2);
        assert_eq!(labels(&report.rows[0]), vec!["a"]);
        assert_eq!(report.rows[0].current_value, 0.3);
        assert_eq!(report.rows[0].size_factor, 0.3953);
        let contribution = report.rows[0].contribution_to_overall_change.unwrap();
        assert!((contribution - 197.6744).abs() < 1e-3);

        let residual = &report.rows[1];
        assert_eq!(labels(residual), vec!["(ALL)-"]);
        assert_eq!(residual.baseline_value, 0.05);
        assert!((residual.current_value - 5.0 / 150.0).abs() < 1e-12);
        assert_eq!(residual.other_dimension_values, vec!["b"]);
    }

    #[test]
    fn test_ratio_residual_with_negative_denominator_is_rejected() {
        let cube = scored_ratio(vec![
            ratio_row(&[], (10.0, 20.0), (200.0, 200.0)),
            ratio_row(&["a"], (5.0, 15.0), (250.0, 50.0)),
        ]);
        let result = Summarizer::new(SummaryConfig::new(1).unwrap()).summarize(&cube);
        assert!(matches!(
            result,
            Err(RcaError::InvalidValue { ref reason, .. }) if reason.contains("baseline denominator")
        ));
    }
}
