//! Cost functions: how much a node explains the overall change
//!
//! A cost function sees a node's [`Amounts`] together with the global
//! totals. The shipped variants are a closed set selected by algorithm name,
//! see [`CostFunction::from_config`]. `balanced` and `contribution` score
//! additive metrics; `ratio` scores quotient metrics such as error rates.

use rca_types::{Amounts, MetricKind, RcaError, RcaResult, RATIO_EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tolerance used when snapping ratios to `0.0` or `1.0`
pub const EPSILON: f64 = 1e-6;

/// Parameter key holding the significance threshold, in percent
pub const CHANGE_CONTRIBUTION_THRESHOLD_PARAM: &str = "change_contribution_threshold";

/// Default significance threshold, in percent of the overall change
pub const DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD: f64 = 3.0;

/// Snap values within [`EPSILON`] of `0.0` or `1.0` to exactly that value
pub fn correct_floating_point(value: f64) -> f64 {
    if value.abs() < EPSILON {
        0.0
    } else if (value - 1.0).abs() < EPSILON {
        1.0
    } else {
        value
    }
}

/// Snap values within [`EPSILON`] of `0.0` to exactly zero
///
/// For absolute amounts such as residuals, where `1.0` is not special.
pub fn snap_to_zero(value: f64) -> f64 {
    if value.abs() < EPSILON {
        0.0
    } else {
        value
    }
}

/// Share of the overall change carried by one node
///
/// Zero when the totals did not move at all.
pub fn contribution_to_overall_change(
    baseline: f64,
    current: f64,
    baseline_total: f64,
    current_total: f64,
) -> f64 {
    let global_change = current_total - baseline_total;
    if global_change == 0.0 {
        0.0
    } else {
        (current - baseline) / global_change
    }
}

/// Share of the overall change carried by a node of either metric kind
///
/// Ratio nodes weigh their change of the quotient by their share of the
/// population, so a tiny segment swinging wildly does not dominate.
pub fn weighted_contribution_to_overall_change(node: &Amounts, totals: &Amounts) -> f64 {
    let contribution = contribution_to_overall_change(
        node.baseline_value(),
        node.current_value(),
        totals.baseline_value(),
        totals.current_value(),
    );
    match node.kind() {
        MetricKind::Additive => correct_floating_point(contribution),
        MetricKind::Ratio => {
            correct_floating_point(share_of(node.size(), totals.size()) * contribution)
        }
    }
}

fn share_of(value: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        value / total
    }
}

/// Relative change of a quotient; moving off an empty baseline counts as 100%
fn change_rate(baseline: f64, current: f64) -> f64 {
    if baseline.abs() > RATIO_EPSILON {
        (current - baseline) / baseline
    } else if current.abs() > RATIO_EPSILON {
        1.0
    } else {
        0.0
    }
}

// ── Variants ─────────────────────────────────────────────────────────

/// Scores a node by its share of the change in excess of its baseline share
///
/// A node that changed in proportion to the whole population scores `0`;
/// a node carrying more of the change than of the baseline scores the
/// difference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalancedCostFunction {
    /// Minimum `|contribution to overall change|`, in percent
    pub change_contribution_threshold: f64,
}

impl BalancedCostFunction {
    pub fn new(change_contribution_threshold: f64) -> Self {
        Self {
            change_contribution_threshold,
        }
    }

    pub fn cost(&self, baseline: f64, current: f64, baseline_total: f64, current_total: f64) -> f64 {
        let contribution = correct_floating_point(contribution_to_overall_change(
            baseline,
            current,
            baseline_total,
            current_total,
        ));
        let baseline_share = correct_floating_point(share_of(baseline, baseline_total));
        (contribution - baseline_share).max(0.0)
    }
}

impl Default for BalancedCostFunction {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD)
    }
}

/// Scores a node by the magnitude of its share of the overall change
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributionCostFunction {
    /// Minimum `|contribution to overall change|`, in percent
    pub change_contribution_threshold: f64,
}

impl ContributionCostFunction {
    pub fn new(change_contribution_threshold: f64) -> Self {
        Self {
            change_contribution_threshold,
        }
    }

    pub fn cost(&self, baseline: f64, current: f64, baseline_total: f64, current_total: f64) -> f64 {
        correct_floating_point(
            contribution_to_overall_change(baseline, current, baseline_total, current_total).abs(),
        )
    }
}

impl Default for ContributionCostFunction {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD)
    }
}

/// Scores a ratio node by how far its rate of change strays from the
/// global one, weighted by its share of the population
///
/// The population of a ratio node is its numerators plus denominators. A
/// segment whose quotient moved like the global quotient scores `0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatioCostFunction {
    /// Minimum `|weighted contribution to overall change|`, in percent
    pub change_contribution_threshold: f64,
}

impl RatioCostFunction {
    pub fn new(change_contribution_threshold: f64) -> Self {
        Self {
            change_contribution_threshold,
        }
    }

    pub fn cost(&self, node: &Amounts, totals: &Amounts) -> f64 {
        let size_factor = share_of(node.size(), totals.size());
        let node_rate = change_rate(node.baseline_value(), node.current_value());
        let global_rate = change_rate(totals.baseline_value(), totals.current_value());
        correct_floating_point(size_factor * (node_rate - global_rate).abs())
    }
}

impl Default for RatioCostFunction {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD)
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

/// The available cost functions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum CostFunction {
    Balanced(BalancedCostFunction),
    Contribution(ContributionCostFunction),
    Ratio(RatioCostFunction),
}

impl CostFunction {
    /// Algorithm name of the balanced variant
    pub const BALANCED: &'static str = "balanced";
    /// Algorithm name of the contribution variant
    pub const CONTRIBUTION: &'static str = "contribution";
    /// Algorithm name of the ratio variant
    pub const RATIO: &'static str = "ratio";

    /// Build a cost function from an algorithm name and string parameters
    ///
    /// A missing threshold falls back to
    /// [`DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD`]; a threshold that is not a
    /// finite, non-negative number is a configuration error.
    pub fn from_config(algorithm: &str, params: &HashMap<String, String>) -> RcaResult<Self> {
        let threshold = match params.get(CHANGE_CONTRIBUTION_THRESHOLD_PARAM) {
            None => DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD,
            Some(raw) => parse_threshold(raw)?,
        };

        match algorithm.trim().to_ascii_lowercase().as_str() {
            Self::BALANCED => Ok(Self::Balanced(BalancedCostFunction::new(threshold))),
            Self::CONTRIBUTION => Ok(Self::Contribution(ContributionCostFunction::new(threshold))),
            Self::RATIO => Ok(Self::Ratio(RatioCostFunction::new(threshold))),
            other => Err(RcaError::Configuration(format!(
                "unknown cost function '{}'",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Balanced(_) => Self::BALANCED,
            Self::Contribution(_) => Self::CONTRIBUTION,
            Self::Ratio(_) => Self::RATIO,
        }
    }

    pub fn change_contribution_threshold(&self) -> f64 {
        match self {
            Self::Balanced(f) => f.change_contribution_threshold,
            Self::Contribution(f) => f.change_contribution_threshold,
            Self::Ratio(f) => f.change_contribution_threshold,
        }
    }

    /// The cost function to use for a metric of `kind`
    ///
    /// Quotients are only comparable through the ratio variant, so a ratio
    /// metric switches to it and keeps the threshold.
    pub fn for_metric(self, kind: MetricKind) -> Self {
        if kind == MetricKind::Ratio && !matches!(self, Self::Ratio(_)) {
            return Self::Ratio(RatioCostFunction::new(self.change_contribution_threshold()));
        }
        self
    }

    /// Score one node against the global totals
    pub fn cost(&self, node: &Amounts, totals: &Amounts) -> f64 {
        let values = || {
            (
                node.baseline_value(),
                node.current_value(),
                totals.baseline_value(),
                totals.current_value(),
            )
        };
        match self {
            Self::Balanced(f) => {
                let (baseline, current, baseline_total, current_total) = values();
                f.cost(baseline, current, baseline_total, current_total)
            }
            Self::Contribution(f) => {
                let (baseline, current, baseline_total, current_total) = values();
                f.cost(baseline, current, baseline_total, current_total)
            }
            Self::Ratio(f) => f.cost(node, totals),
        }
    }

    /// Whether the node carries enough of the overall change to be selected
    pub fn is_significant(&self, node: &Amounts, totals: &Amounts) -> bool {
        weighted_contribution_to_overall_change(node, totals).abs() * 100.0
            >= self.change_contribution_threshold()
    }
}

impl Default for CostFunction {
    fn default() -> Self {
        Self::Balanced(BalancedCostFunction::default())
    }
}

fn parse_threshold(raw: &str) -> RcaResult<f64> {
    let threshold: f64 = raw.trim().parse().map_err(|_| {
        RcaError::Configuration(format!(
            "{} must be a number, got '{}'",
            CHANGE_CONTRIBUTION_THRESHOLD_PARAM, raw
        ))
    })?;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(RcaError::Configuration(format!(
            "{} must be a finite non-negative number, got {}",
            CHANGE_CONTRIBUTION_THRESHOLD_PARAM, threshold
        )));
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(threshold: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            CHANGE_CONTRIBUTION_THRESHOLD_PARAM.to_string(),
            threshold.to_string(),
        );
        map
    }

    #[test]
    fn test_correction_snaps_near_targets() {
        assert_eq!(correct_floating_point(0.0000009), 0.0);
        assert_eq!(correct_floating_point(-0.0000009), 0.0);
        assert_eq!(correct_floating_point(1.0000009), 1.0);
        assert_eq!(correct_floating_point(0.9999991), 1.0);
        assert_eq!(correct_floating_point(0.5), 0.5);
        assert_eq!(correct_floating_point(-0.00001), -0.00001);
    }

    #[test]
    fn test_balanced_cost_scenario() {
        let f = BalancedCostFunction::default();
        // X=a dropped 80% while the total dropped 40%
        let a = f.cost(10.0, 2.0, 100.0, 60.0);
        let b = f.cost(90.0, 58.0, 100.0, 60.0);
        assert!((a - 0.1).abs() < 1e-9);
        assert_eq!(b, 0.0);
        assert!(a > b);
    }

    #[test]
    fn test_proportional_change_costs_nothing() {
        let f = BalancedCostFunction::default();
        assert_eq!(f.cost(50.0, 25.0, 100.0, 50.0), 0.0);
    }

    #[test]
    fn test_snap_to_zero_leaves_one_alone() {
        assert_eq!(snap_to_zero(0.0000009), 0.0);
        assert_eq!(snap_to_zero(-0.0000009), 0.0);
        assert_eq!(snap_to_zero(1.0000004), 1.0000004);
        assert_eq!(snap_to_zero(0.9999996), 0.9999996);
        assert_eq!(correct_floating_point(1.0000004), 1.0);
    }

    #[test]
    fn test_zero_totals_do_not_produce_nan() {
        let f = CostFunction::default();
        let cost = f.cost(&Amounts::additive(0.0, 5.0), &Amounts::additive(0.0, 5.0));
        assert!(cost.is_finite());
        assert_eq!(cost, 1.0);
        assert_eq!(
            f.cost(&Amounts::additive(3.0, 3.0), &Amounts::additive(10.0, 10.0)),
            0.0
        );
    }

    #[test]
    fn test_significance_threshold() {
        let f = CostFunction::default();
        let totals = Amounts::additive(100.0, 60.0);
        // 1 of 40 changed units is 2.5%, below the 3% default
        assert!(!f.is_significant(&Amounts::additive(10.0, 9.0), &totals));
        assert!(f.is_significant(&Amounts::additive(10.0, 8.0), &totals));
    }

    #[test]
    fn test_ratio_cost_scenario() {
        let f = RatioCostFunction::default();
        // Error rate 5% -> 10% overall; segment a went 5% -> 30%, b stayed at 5%
        let totals = Amounts::ratio(10.0, 20.0, 200.0, 200.0);
        let a = Amounts::ratio(5.0, 15.0, 100.0, 50.0);
        let b = Amounts::ratio(5.0, 7.5, 100.0, 150.0);
        let cost_a = f.cost(&a, &totals);
        let cost_b = f.cost(&b, &totals);
        assert!(cost_a > cost_b);
        // a: size 170/430, rate +5 against the global +1
        assert!((cost_a - 170.0 / 430.0 * 4.0).abs() < 1e-9);
        // b: size 262.5/430, rate 0 against the global +1
        assert!((cost_b - 262.5 / 430.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_moving_with_the_total_costs_nothing() {
        let f = RatioCostFunction::default();
        let totals = Amounts::ratio(10.0, 20.0, 200.0, 200.0);
        assert_eq!(f.cost(&Amounts::ratio(5.0, 10.0, 100.0, 100.0), &totals), 0.0);
        assert_eq!(
            f.cost(&Amounts::ratio(0.0, 0.0, 0.0, 0.0), &Amounts::ratio(0.0, 0.0, 0.0, 0.0)),
            0.0
        );
    }

    #[test]
    fn test_ratio_significance_is_size_weighted() {
        let f = CostFunction::Ratio(RatioCostFunction::default());
        let totals = Amounts::ratio(10.0, 20.0, 200.0, 200.0);
        // Quotient doubled like the total, but the node is a sliver of the population
        let tiny = Amounts::ratio(0.1, 0.2, 1.0, 1.0);
        assert!(!f.is_significant(&tiny, &totals));
        let large = Amounts::ratio(5.0, 15.0, 100.0, 50.0);
        assert!(f.is_significant(&large, &totals));
    }

    #[test]
    fn test_ratio_metrics_switch_to_the_ratio_variant() {
        let f = CostFunction::from_config("contribution", &params("5")).unwrap();
        let ratio = f.clone().for_metric(MetricKind::Ratio);
        assert_eq!(ratio.name(), "ratio");
        assert_eq!(ratio.change_contribution_threshold(), 5.0);
        assert_eq!(f.clone().for_metric(MetricKind::Additive), f);
    }

    #[test]
    fn test_from_config_defaults_when_absent() {
        let f = CostFunction::from_config("balanced", &HashMap::new()).unwrap();
        assert_eq!(
            f.change_contribution_threshold(),
            DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD
        );
        assert_eq!(f.name(), "balanced");
    }

    #[test]
    fn test_from_config_parses_threshold() {
        let f = CostFunction::from_config("contribution", &params(" 5.5 ")).unwrap();
        assert_eq!(f.change_contribution_threshold(), 5.5);
        assert_eq!(f.name(), "contribution");
    }

    #[test]
    fn test_from_config_rejects_bad_values() {
        assert!(matches!(
            CostFunction::from_config("balanced", &params("three")),
            Err(RcaError::Configuration(_))
        ));
        assert!(matches!(
            CostFunction::from_config("balanced", &params("-1")),
            Err(RcaError::Configuration(_))
        ));
        assert!(matches!(
            CostFunction::from_config("balanced", &params("NaN")),
            Err(RcaError::Configuration(_))
        ));
        assert!(matches!(
            CostFunction::from_config("magic", &HashMap::new()),
            Err(RcaError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_config_builds_ratio_variant() {
        let f = CostFunction::from_config(" Ratio ", &params("1")).unwrap();
        assert_eq!(f, CostFunction::Ratio(RatioCostFunction::new(1.0)));
        assert_eq!(f.name(), "ratio");
    }

    #[test]
    fn test_contribution_cost_is_absolute_share() {
        let f = ContributionCostFunction::default();
        assert!((f.cost(10.0, 2.0, 100.0, 60.0) - 0.2).abs() < 1e-9);
        assert!((f.cost(10.0, 18.0, 100.0, 60.0) - 0.2).abs() < 1e-9);
    }
}
