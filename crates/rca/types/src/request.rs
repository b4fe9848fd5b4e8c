//! Analysis requests: what to explain and over which intervals

use crate::{Dimensions, MetricKind, RcaError, RcaResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Half-open time interval `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> RcaResult<Self> {
        if end <= start {
            return Err(RcaError::InvalidArgument(format!(
                "interval end {} must be after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// The same interval moved `offset` into the past
    pub fn shifted_back(&self, offset: Duration) -> Self {
        Self {
            start: self.start - offset,
            end: self.end - offset,
        }
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// One dimension analysis request
///
/// The anomaly interval (`current`) and the comparison interval (`baseline`)
/// are supplied by the upstream detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Metric being explained
    pub metric: String,
    /// All dimensions available on the metric
    pub dimensions: Dimensions,
    /// Dimensions to leave out of the exploration
    #[serde(default)]
    pub excluded_dimensions: Vec<String>,
    /// Suggested dimension hierarchies, e.g. `[continent, country]`
    #[serde(default)]
    pub hierarchies: Vec<Vec<String>>,
    /// Equality filters applied before aggregation
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
    pub current: TimeInterval,
    pub baseline: TimeInterval,
    /// Explore dimensions in the given order instead of ranking them by cost
    #[serde(default)]
    pub manual_order: bool,
    /// Overrides the configured exploration depth
    #[serde(default)]
    pub depth: Option<usize>,
    /// Overrides the configured number of rows selected per level
    #[serde(default)]
    pub summary_size: Option<usize>,
    /// Whether the metric sums up or is a quotient of two sums
    #[serde(default)]
    pub metric_kind: MetricKind,
}

impl AnalysisRequest {
    pub fn new(
        metric: impl Into<String>,
        dimensions: Dimensions,
        current: TimeInterval,
        baseline: TimeInterval,
    ) -> Self {
        Self {
            metric: metric.into(),
            dimensions,
            excluded_dimensions: Vec::new(),
            hierarchies: Vec::new(),
            filters: BTreeMap::new(),
            current,
            baseline,
            manual_order: false,
            depth: None,
            summary_size: None,
            metric_kind: MetricKind::Additive,
        }
    }

    pub fn with_excluded_dimension(mut self, name: impl Into<String>) -> Self {
        self.excluded_dimensions.push(name.into());
        self
    }

    pub fn with_hierarchy<I, S>(mut self, hierarchy: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hierarchies
            .push(hierarchy.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_manual_order(mut self, manual_order: bool) -> Self {
        self.manual_order = manual_order;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_summary_size(mut self, summary_size: usize) -> Self {
        self.summary_size = Some(summary_size);
        self
    }

    pub fn with_metric_kind(mut self, metric_kind: MetricKind) -> Self {
        self.metric_kind = metric_kind;
        self
    }

    /// Dimensions left to explore once exclusions are applied
    pub fn explorable_dimensions(&self) -> Dimensions {
        self.dimensions.without(&self.excluded_dimensions)
    }

    /// Reject requests that cannot be analyzed
    pub fn validate(&self) -> RcaResult<()> {
        if self.metric.trim().is_empty() {
            return Err(RcaError::InvalidArgument(
                "metric name must not be blank".to_string(),
            ));
        }
        if self.current.end <= self.current.start || self.baseline.end <= self.baseline.start {
            return Err(RcaError::InvalidArgument(
                "intervals must have end after start".to_string(),
            ));
        }
        for name in &self.excluded_dimensions {
            if !self.dimensions.contains(name) {
                return Err(RcaError::InvalidArgument(format!(
                    "excluded dimension '{}' is not a dimension of '{}'",
                    name, self.metric
                )));
            }
        }
        for name in self.filters.keys() {
            if !self.dimensions.contains(name) {
                return Err(RcaError::InvalidArgument(format!(
                    "filter on unknown dimension '{}'",
                    name
                )));
            }
        }
        if self.explorable_dimensions().is_empty() {
            return Err(RcaError::InvalidArgument(
                "no dimension left to explore".to_string(),
            ));
        }
        if self.depth == Some(0) {
            return Err(RcaError::InvalidArgument(
                "depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
