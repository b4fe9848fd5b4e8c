//! Metric amounts
//!
//! An additive metric (page views, revenue) carries one baseline and one
//! current value per row; those values sum up along the cube. A ratio metric
//! (errors / requests) carries the numerator in the same two fields and its
//! denominators next to them. Numerators and denominators sum up; the ratio
//! itself is only ever derived.

use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Sub, SubAssign};

/// Numerators and denominators closer to zero than this count as zero
pub const RATIO_EPSILON: f64 = 1e-4;

/// How a metric aggregates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Values sum up
    #[default]
    Additive,
    /// Quotient of two additive metrics
    Ratio,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Additive => write!(f, "additive"),
            Self::Ratio => write!(f, "ratio"),
        }
    }
}

/// Baseline and current denominators of a ratio metric
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Denominators {
    pub baseline: f64,
    pub current: f64,
}

impl Denominators {
    pub fn new(baseline: f64, current: f64) -> Self {
        Self { baseline, current }
    }
}

/// Raw baseline and current amounts of one row or cube node
///
/// `baseline` and `current` are the values of an additive metric, or the
/// numerators of a ratio metric when `denominators` is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Amounts {
    pub baseline: f64,
    pub current: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominators: Option<Denominators>,
}

impl Amounts {
    pub fn additive(baseline: f64, current: f64) -> Self {
        Self {
            baseline,
            current,
            denominators: None,
        }
    }

    pub fn ratio(
        baseline_numerator: f64,
        current_numerator: f64,
        baseline_denominator: f64,
        current_denominator: f64,
    ) -> Self {
        Self {
            baseline: baseline_numerator,
            current: current_numerator,
            denominators: Some(Denominators::new(baseline_denominator, current_denominator)),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self.denominators {
            None => MetricKind::Additive,
            Some(_) => MetricKind::Ratio,
        }
    }

    /// Population weight in the baseline
    ///
    /// The value itself for an additive metric; numerator plus denominator
    /// for a ratio.
    pub fn baseline_size(&self) -> f64 {
        self.baseline + self.denominators.map_or(0.0, |d| d.baseline)
    }

    /// Population weight in the current interval
    pub fn current_size(&self) -> f64 {
        self.current + self.denominators.map_or(0.0, |d| d.current)
    }

    /// Combined baseline and current size
    pub fn size(&self) -> f64 {
        self.baseline_size() + self.current_size()
    }

    pub fn baseline_value(&self) -> f64 {
        match self.denominators {
            None => self.baseline,
            Some(d) => self.quotient(self.baseline, d.baseline),
        }
    }

    pub fn current_value(&self) -> f64 {
        match self.denominators {
            None => self.current,
            Some(d) => self.quotient(self.current, d.current),
        }
    }

    /// `numerator / denominator`, defined for an empty denominator too
    ///
    /// Both empty reads as `0`. A numerator over an empty denominator is
    /// divided by the node size instead, which keeps the value bounded.
    fn quotient(&self, numerator: f64, denominator: f64) -> f64 {
        if denominator.abs() > RATIO_EPSILON {
            numerator / denominator
        } else if numerator.abs() <= RATIO_EPSILON {
            0.0
        } else {
            let size = self.size();
            if size == 0.0 {
                0.0
            } else {
                numerator / size
            }
        }
    }

    /// Every stored component is exactly zero
    pub fn is_zero(&self) -> bool {
        self.components().iter().all(|(_, value)| *value == 0.0)
    }

    /// Stored components with their names, numerators first
    pub fn components(&self) -> Vec<(&'static str, f64)> {
        match self.denominators {
            None => vec![("baseline", self.baseline), ("current", self.current)],
            Some(d) => vec![
                ("baseline numerator", self.baseline),
                ("current numerator", self.current),
                ("baseline denominator", d.baseline),
                ("current denominator", d.current),
            ],
        }
    }

    /// Apply `f` to every stored component
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            baseline: f(self.baseline),
            current: f(self.current),
            denominators: self
                .denominators
                .map(|d| Denominators::new(f(d.baseline), f(d.current))),
        }
    }
}

impl AddAssign for Amounts {
    fn add_assign(&mut self, other: Self) {
        self.baseline += other.baseline;
        self.current += other.current;
        self.denominators = match (self.denominators, other.denominators) {
            (Some(a), Some(b)) => Some(Denominators::new(
                a.baseline + b.baseline,
                a.current + b.current,
            )),
            (None, Some(b)) => Some(b),
            (a, None) => a,
        };
    }
}

impl SubAssign for Amounts {
    fn sub_assign(&mut self, other: Self) {
        self.baseline -= other.baseline;
        self.current -= other.current;
        self.denominators = match (self.denominators, other.denominators) {
            (Some(a), Some(b)) => Some(Denominators::new(
                a.baseline - b.baseline,
                a.current - b.current,
            )),
            (None, Some(b)) => Some(Denominators::new(-b.baseline, -b.current)),
            (a, None) => a,
        };
    }
}

impl Sub for Amounts {
    type Output = Self;

    fn sub(mut self, other: Self) -> Self {
        self -= other;
        self
    }
}
