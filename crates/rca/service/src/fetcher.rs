//! Data access for dimension analysis
//!
//! A [`CubeFetcher`] answers the two aggregate queries the analysis needs.
//! [`InMemoryCubeFetcher`] answers them from a list of timestamped facts.
//! For a ratio request each fact's `value` is a numerator and its
//! `denominator` is summed next to it.

use crate::FetchResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rca_types::{
    AggregateRow, Amounts, AnalysisRequest, DimensionRow, DimensionValues, Dimensions, MetricKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source of aggregated metric values
#[async_trait]
pub trait CubeFetcher: Send + Sync {
    /// Baseline and current totals of every value of every dimension
    async fn fetch_dimension_rows(
        &self,
        request: &AnalysisRequest,
        dimensions: &Dimensions,
    ) -> FetchResult<Vec<DimensionRow>>;

    /// Baseline and current totals of every combination of the first
    /// `0..=depth` dimensions, including the zero-dimension total
    async fn fetch_cube_rows(
        &self,
        request: &AnalysisRequest,
        dimensions: &Dimensions,
        depth: usize,
    ) -> FetchResult<Vec<AggregateRow>>;
}

// ── In-memory facts ──────────────────────────────────────────────────

/// One metric observation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    pub timestamp: DateTime<Utc>,
    pub dimensions: BTreeMap<String, String>,
    pub value: f64,
    /// Denominator of a ratio metric; absent reads as zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<f64>,
}

impl FactRecord {
    pub fn new<I, K, V>(timestamp: DateTime<Utc>, dimensions: I, value: f64) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            timestamp,
            dimensions: dimensions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            value,
            denominator: None,
        }
    }

    pub fn with_denominator(mut self, denominator: f64) -> Self {
        self.denominator = Some(denominator);
        self
    }

    /// Value of `dimension`; absent dimensions read as the empty string
    pub fn dimension_value(&self, dimension: &str) -> &str {
        self.dimensions
            .get(dimension)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Fetcher over facts held in memory
#[derive(Clone, Debug, Default)]
pub struct InMemoryCubeFetcher {
    facts: Vec<FactRecord>,
}

impl InMemoryCubeFetcher {
    pub fn new(facts: Vec<FactRecord>) -> Self {
        Self { facts }
    }

    pub fn facts(&self) -> &[FactRecord] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Facts passing the request's filters, with their baseline and current
    /// contribution
    fn matching<'a>(
        &'a self,
        request: &'a AnalysisRequest,
    ) -> impl Iterator<Item = (&'a FactRecord, Amounts)> + 'a {
        self.facts
            .iter()
            .filter(move |fact| {
                request.filters.iter().all(|(name, allowed)| {
                    allowed
                        .iter()
                        .any(|value| value == fact.dimension_value(name))
                })
            })
            .filter_map(move |fact| {
                let in_baseline = request.baseline.contains(fact.timestamp);
                let in_current = request.current.contains(fact.timestamp);
                (in_baseline || in_current).then(|| {
                    let side = |inside: bool, value: f64| if inside { value } else { 0.0 };
                    let numerators = (side(in_baseline, fact.value), side(in_current, fact.value));
                    let amounts = match request.metric_kind {
                        MetricKind::Additive => Amounts::additive(numerators.0, numerators.1),
                        MetricKind::Ratio => {
                            let denominator = fact.denominator.unwrap_or(0.0);
                            Amounts::ratio(
                                numerators.0,
                                numerators.1,
                                side(in_baseline, denominator),
                                side(in_current, denominator),
                            )
                        }
                    };
                    (fact, amounts)
                })
            })
    }
}

/// Zero amounts of the request's metric kind
fn empty_amounts(request: &AnalysisRequest) -> Amounts {
    match request.metric_kind {
        MetricKind::Additive => Amounts::additive(0.0, 0.0),
        MetricKind::Ratio => Amounts::ratio(0.0, 0.0, 0.0, 0.0),
    }
}

#[async_trait]
impl CubeFetcher for InMemoryCubeFetcher {
    async fn fetch_dimension_rows(
        &self,
        request: &AnalysisRequest,
        dimensions: &Dimensions,
    ) -> FetchResult<Vec<DimensionRow>> {
        let mut totals: BTreeMap<(&str, &str), Amounts> = BTreeMap::new();
        for (fact, amounts) in self.matching(request) {
            for name in dimensions.iter() {
                *totals
                    .entry((name, fact.dimension_value(name)))
                    .or_insert_with(|| empty_amounts(request)) += amounts;
            }
        }

        Ok(totals
            .into_iter()
            .map(|((name, value), amounts)| {
                let mut row = DimensionRow::new(name, value, amounts.baseline, amounts.current);
                row.denominators = amounts.denominators;
                row
            })
            .collect())
    }

    async fn fetch_cube_rows(
        &self,
        request: &AnalysisRequest,
        dimensions: &Dimensions,
        depth: usize,
    ) -> FetchResult<Vec<AggregateRow>> {
        let names = dimensions.names_to_depth(depth);
        let mut totals: BTreeMap<DimensionValues, Amounts> = BTreeMap::new();
        totals.insert(DimensionValues::root(), empty_amounts(request));

        for (fact, amounts) in self.matching(request) {
            let values: Vec<&str> = names.iter().map(|name| fact.dimension_value(name)).collect();
            for level in 0..=values.len() {
                *totals
                    .entry(DimensionValues::new(values[..level].iter().copied()))
                    .or_insert_with(|| empty_amounts(request)) += amounts;
            }
        }

        tracing::debug!(
            metric = %request.metric,
            kind = %request.metric_kind,
            depth = names.len(),
            rows = totals.len(),
            "Aggregated cube rows in memory"
        );

        Ok(totals
            .into_iter()
            .map(|(values, amounts)| {
                let mut row = AggregateRow::new(values, amounts.baseline, amounts.current);
                row.denominators = amounts.denominators;
                row
            })
            .collect())
    }
}
