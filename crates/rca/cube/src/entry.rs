//! Per-(dimension, value) cost entries and automatic dimension ordering
//!
//! Marginal rows are folded into [`CostEntry`]s, scored, and rolled up per
//! dimension. The per-dimension costs then decide which dimensions the cube
//! explores and in which order.

use crate::cost::{correct_floating_point, CostFunction};
use rca_types::{Amounts, DimensionCost, DimensionRow, Dimensions, RcaError, RcaResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Number of entries written to the debug log after scoring
const LOGGED_ENTRY_COUNT: usize = 20;

// ── CostEntry ────────────────────────────────────────────────────────

/// Statistics of one dimension value across the whole dataset
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CostEntry {
    dimension_name: String,
    dimension_value: String,
    amounts: Amounts,
    change_ratio: Option<f64>,
    change_diff: f64,
    size_factor: f64,
    cost: f64,
}

impl CostEntry {
    /// Create an empty entry; both the name and the value are required
    pub fn new(dimension_name: impl Into<String>, dimension_value: Option<String>) -> RcaResult<Self> {
        let dimension_name = dimension_name.into();
        if dimension_name.trim().is_empty() {
            return Err(RcaError::NullArgument(
                "cost entry requires a dimension name".to_string(),
            ));
        }
        let dimension_value = dimension_value.ok_or_else(|| {
            RcaError::NullArgument(format!(
                "cost entry for '{}' requires a dimension value",
                dimension_name
            ))
        })?;

        Ok(Self {
            dimension_name,
            dimension_value,
            amounts: Amounts::default(),
            change_ratio: None,
            change_diff: 0.0,
            size_factor: 0.0,
            cost: 0.0,
        })
    }

    /// Create an entry holding one marginal row
    pub fn from_row(row: &DimensionRow) -> RcaResult<Self> {
        let mut entry = Self::new(row.dimension_name.clone(), row.dimension_value.clone())?;
        entry.accumulate(row.amounts());
        Ok(entry)
    }

    pub(crate) fn accumulate(&mut self, amounts: Amounts) {
        self.amounts += amounts;
    }

    pub(crate) fn finalize(&mut self, cost_function: &CostFunction, totals: &Amounts) {
        let (baseline, current) = (self.baseline_value(), self.current_value());
        self.change_diff = current - baseline;
        self.change_ratio = if baseline != 0.0 {
            Some(current / baseline)
        } else {
            None
        };
        let total_size = totals.size();
        self.size_factor = if total_size != 0.0 {
            correct_floating_point(self.amounts.size() / total_size)
        } else {
            0.0
        };
        self.cost = cost_function.cost(&self.amounts, totals);
    }

    pub fn dimension_name(&self) -> &str {
        &self.dimension_name
    }

    pub fn dimension_value(&self) -> &str {
        &self.dimension_value
    }

    pub fn amounts(&self) -> &Amounts {
        &self.amounts
    }

    pub fn baseline_size(&self) -> f64 {
        self.amounts.baseline_size()
    }

    pub fn current_size(&self) -> f64 {
        self.amounts.current_size()
    }

    pub fn baseline_value(&self) -> f64 {
        self.amounts.baseline_value()
    }

    pub fn current_value(&self) -> f64 {
        self.amounts.current_value()
    }

    /// `current / baseline`; `None` for an empty baseline
    pub fn change_ratio(&self) -> Option<f64> {
        self.change_ratio
    }

    pub fn change_diff(&self) -> f64 {
        self.change_diff
    }

    /// Share of the combined baseline and current population
    pub fn size_factor(&self) -> f64 {
        self.size_factor
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }
}

// ── Scoring ──────────────────────────────────────────────────────────

/// Fold marginal rows into scored entries, sorted by cost descending
///
/// Rows repeating a (name, value) pair are summed. Ties keep name and value
/// order. Every row must be of the same metric kind as `totals`.
pub fn compute_one_dimension_costs(
    rows: &[DimensionRow],
    cost_function: &CostFunction,
    totals: &Amounts,
) -> RcaResult<Vec<CostEntry>> {
    let mut grouped: BTreeMap<(String, String), CostEntry> = BTreeMap::new();
    for row in rows {
        let amounts = row.amounts();
        if amounts.kind() != totals.kind() {
            return Err(RcaError::InvalidArgument(format!(
                "marginal row {}={} is not a {} row like the totals",
                row.dimension_name,
                row.dimension_value.as_deref().unwrap_or("null"),
                totals.kind()
            )));
        }
        let entry = CostEntry::from_row(row)?;
        let key = (entry.dimension_name.clone(), entry.dimension_value.clone());
        grouped
            .entry(key)
            .and_modify(|existing| existing.accumulate(amounts))
            .or_insert(entry);
    }

    let mut entries: Vec<CostEntry> = grouped.into_values().collect();
    for entry in &mut entries {
        entry.finalize(cost_function, totals);
    }
    entries.sort_by(|a, b| b.cost.total_cmp(&a.cost));

    for entry in entries.iter().take(LOGGED_ENTRY_COUNT) {
        tracing::debug!(
            dimension = %entry.dimension_name,
            value = %entry.dimension_value,
            baseline = entry.baseline_value(),
            current = entry.current_value(),
            cost = entry.cost,
            "Scored dimension value"
        );
    }

    Ok(entries)
}

/// Total cost of every dimension, sorted descending (ties by name)
pub fn calculate_sorted_dimension_costs(entries: &[CostEntry]) -> Vec<DimensionCost> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for entry in entries {
        *totals.entry(entry.dimension_name.as_str()).or_insert(0.0) += entry.cost;
    }

    let mut costs: Vec<DimensionCost> = totals
        .into_iter()
        .map(|(name, cost)| DimensionCost::new(name, cost))
        .collect();
    costs.sort_by(|a, b| b.cost.total_cmp(&a.cost));
    costs
}

// ── Dimension ordering ───────────────────────────────────────────────

struct DimensionGroup {
    names: Vec<String>,
    cost: f64,
}

/// Choose and order the dimensions to explore
///
/// Keeps the `max(1, depth)` most costly dimensions. Dimensions that belong
/// to the same suggested hierarchy stay together in hierarchy order; groups
/// (and ungrouped dimensions) are ordered by their average cost, highest
/// first. Hierarchies with fewer than two entries are ignored.
pub fn sort_dimensions(
    sorted_costs: &[DimensionCost],
    depth: usize,
    hierarchies: &[Vec<String>],
) -> RcaResult<Dimensions> {
    let kept = &sorted_costs[..sorted_costs.len().min(depth.max(1))];
    let mut available: Vec<&str> = kept.iter().map(|c| c.name.as_str()).collect();

    let mut groups: Vec<DimensionGroup> = Vec::new();
    for hierarchy in hierarchies.iter().filter(|h| h.len() >= 2) {
        let mut names = Vec::new();
        for name in hierarchy {
            if let Some(pos) = available.iter().position(|a| a == name) {
                available.remove(pos);
                names.push(name.clone());
            }
        }
        if !names.is_empty() {
            groups.push(DimensionGroup { names, cost: 0.0 });
        }
    }
    for name in available {
        groups.push(DimensionGroup {
            names: vec![name.to_string()],
            cost: 0.0,
        });
    }

    for group in &mut groups {
        let members: HashSet<&str> = group.names.iter().map(String::as_str).collect();
        let total: f64 = kept
            .iter()
            .filter(|c| members.contains(c.name.as_str()))
            .map(|c| c.cost)
            .sum();
        group.cost = total / group.names.len() as f64;
    }
    groups.sort_by(|a, b| b.cost.total_cmp(&a.cost));

    let dimensions = Dimensions::new(groups.into_iter().flat_map(|g| g.names))?;
    tracing::debug!(dimensions = %dimensions, "Ordered dimensions by cost");
    Ok(dimensions)
}
