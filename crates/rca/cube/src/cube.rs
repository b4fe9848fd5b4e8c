//! The dimension cube: every explored dimension-value combination as a tree
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The root is
//! the overall total; a node at level `n` fixes the first `n` dimensions and
//! its parent drops the last of them.
//!
//! Construction is bottom-up in [`DimensionValues`] order, so every node is
//! finished before its parent. Combinations that were never fetched are
//! synthesized from their children; combinations with nothing in either
//! interval are pruned together with their subtree.
//!
//! Every row must be of the root's [`MetricKind`]. Ratio nodes aggregate
//! their numerators and denominators; their values are the quotients.

use crate::cost::{CostFunction, EPSILON};
use rayon::prelude::*;
use rca_types::{
    AggregateRow, Amounts, DimensionValues, Dimensions, MetricKind, RcaError, RcaResult,
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

// ── Nodes ────────────────────────────────────────────────────────────

/// Index of a node inside its cube
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One dimension-value combination with its aggregated values
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CubeNode {
    values: DimensionValues,
    amounts: Amounts,
    observed: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    cost: f64,
}

impl CubeNode {
    pub fn values(&self) -> &DimensionValues {
        &self.values
    }

    pub fn level(&self) -> usize {
        self.values.level()
    }

    /// Raw amounts: values, or numerators and denominators of a ratio
    pub fn amounts(&self) -> &Amounts {
        &self.amounts
    }

    pub fn baseline_value(&self) -> f64 {
        self.amounts.baseline_value()
    }

    pub fn current_value(&self) -> f64 {
        self.amounts.current_value()
    }

    /// Population weight in the baseline; equals the value for additive metrics
    pub fn baseline_size(&self) -> f64 {
        self.amounts.baseline_size()
    }

    /// Population weight in the current interval
    pub fn current_size(&self) -> f64 {
        self.amounts.current_size()
    }

    /// Combined baseline and current size, used to order siblings
    pub fn size(&self) -> f64 {
        self.amounts.size()
    }

    pub fn change(&self) -> f64 {
        self.current_value() - self.baseline_value()
    }

    /// `current / baseline`; `None` for an empty baseline
    pub fn change_ratio(&self) -> Option<f64> {
        let baseline = self.baseline_value();
        if baseline == 0.0 {
            None
        } else {
            Some(self.current_value() / baseline)
        }
    }

    /// `true` when the node went up (or stayed flat)
    pub fn side(&self) -> bool {
        self.current_value() >= self.baseline_value()
    }

    /// Whether the values were fetched rather than summed from children
    pub fn is_observed(&self) -> bool {
        self.observed
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Cost assigned by [`Cube::score`]; zero before scoring
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

// ── Construction ─────────────────────────────────────────────────────

#[derive(Default)]
struct PendingNode {
    observed: Option<Amounts>,
    children: Amounts,
    has_children: bool,
}

struct FinishedNode {
    values: DimensionValues,
    amounts: Amounts,
    observed: bool,
}

fn check_amounts(values: &DimensionValues, amounts: &Amounts) -> RcaResult<()> {
    for (name, value) in amounts.components() {
        if !value.is_finite() {
            return Err(RcaError::InvalidValue {
                values: values.clone(),
                reason: format!("{} value {} is not finite", name, value),
            });
        }
        if value < 0.0 {
            return Err(RcaError::InvalidValue {
                values: values.clone(),
                reason: format!("{} value {} is negative", name, value),
            });
        }
    }
    Ok(())
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * (1.0 + a.abs().max(b.abs()))
}

/// Same kind, and every component agrees within tolerance
fn amounts_agree(a: &Amounts, b: &Amounts) -> bool {
    a.kind() == b.kind()
        && a
            .components()
            .iter()
            .zip(b.components())
            .all(|((_, x), (_, y))| approx_eq(*x, y))
}

// ── Cube ─────────────────────────────────────────────────────────────

/// Tree of dimension-value combinations for one analysis
#[derive(Clone, Debug)]
pub struct Cube {
    dimensions: Dimensions,
    depth: usize,
    nodes: Vec<CubeNode>,
    root: NodeId,
    index: HashMap<DimensionValues, NodeId>,
}

impl Cube {
    /// Build the cube from fetched rows
    ///
    /// `dimensions` fixes the meaning of each position in a row's values;
    /// nodes are created down to `max_depth` levels (capped by the number of
    /// dimensions). Deeper rows only contribute to the synthesis of their
    /// ancestors.
    pub fn build(
        dimensions: Dimensions,
        rows: impl IntoIterator<Item = AggregateRow>,
        max_depth: usize,
    ) -> RcaResult<Self> {
        if max_depth == 0 {
            return Err(RcaError::InvalidArgument(
                "cube depth must be at least 1".to_string(),
            ));
        }
        let depth = max_depth.min(dimensions.len());

        let mut pending: BTreeMap<DimensionValues, PendingNode> = BTreeMap::new();
        let mut row_count = 0usize;
        for row in rows {
            if row.values.len() > dimensions.len() {
                return Err(RcaError::InvalidArgument(format!(
                    "row {} has more values than the {} dimensions",
                    row.values,
                    dimensions.len()
                )));
            }
            let amounts = row.amounts();
            check_amounts(&row.values, &amounts)?;

            let slot = pending.entry(row.values.clone()).or_default();
            if slot.observed.is_some() {
                return Err(RcaError::DuplicateCombination(row.values));
            }
            slot.observed = Some(amounts);
            row_count += 1;
        }

        let kind = match pending.get(&DimensionValues::root()) {
            Some(PendingNode {
                observed: Some(root),
                ..
            }) => root.kind(),
            _ => return Err(RcaError::MissingRootAggregate),
        };
        if let Some((values, _)) = pending.iter().find(|(_, node)| {
            node.observed
                .is_some_and(|observed| observed.kind() != kind)
        }) {
            return Err(RcaError::InvalidArgument(format!(
                "row {} is not a {} row like the root aggregate",
                values, kind
            )));
        }

        // Deepest first: every child is folded into its parent before the
        // parent itself is popped.
        let mut finished: Vec<FinishedNode> = Vec::with_capacity(pending.len());
        while let Some((values, node)) = pending.pop_first() {
            let amounts = match node.observed {
                Some(observed) => {
                    if node.has_children && !amounts_agree(&observed, &node.children) {
                        tracing::warn!(
                            values = %values,
                            baseline = observed.baseline,
                            current = observed.current,
                            child_baseline = node.children.baseline,
                            child_current = node.children.current,
                            "Fetched aggregate disagrees with the sum of its children"
                        );
                    }
                    observed
                }
                None => node.children,
            };

            if let Some(parent) = values.parent() {
                let slot = pending.entry(parent).or_default();
                slot.children += amounts;
                slot.has_children = true;
            }

            if values.level() <= depth {
                finished.push(FinishedNode {
                    values,
                    amounts,
                    observed: node.observed.is_some(),
                });
            }
        }

        let mut cube = Self {
            dimensions,
            depth,
            nodes: Vec::with_capacity(finished.len()),
            root: NodeId(0),
            index: HashMap::with_capacity(finished.len()),
        };

        // Shallowest first so a parent always exists before its children.
        let mut pruned = 0usize;
        for node in finished.into_iter().rev() {
            let parent = match node.values.parent() {
                None => None,
                Some(parent_values) => match cube.index.get(&parent_values) {
                    Some(id) => Some(*id),
                    None => {
                        pruned += 1;
                        continue;
                    }
                },
            };
            if parent.is_some() && node.amounts.is_zero() {
                pruned += 1;
                continue;
            }

            let id = NodeId(cube.nodes.len());
            cube.nodes.push(CubeNode {
                values: node.values.clone(),
                amounts: node.amounts,
                observed: node.observed,
                parent,
                children: Vec::new(),
                cost: 0.0,
            });
            cube.index.insert(node.values, id);
            if let Some(parent) = parent {
                cube.nodes[parent.0].children.push(id);
            }
        }

        cube.sort_children();

        tracing::info!(
            dimensions = %cube.dimensions,
            kind = %kind,
            depth = cube.depth,
            rows = row_count,
            nodes = cube.nodes.len(),
            pruned,
            "Built dimension cube"
        );

        Ok(cube)
    }

    fn sort_children(&mut self) {
        for i in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[i].children);
            let nodes = &self.nodes;
            children.sort_by(|a, b| {
                let (a, b) = (&nodes[a.0], &nodes[b.0]);
                b.size()
                    .total_cmp(&a.size())
                    .then_with(|| a.values.cmp(&b.values))
            });
            self.nodes[i].children = children;
        }
    }

    /// Assign every node its cost against the overall totals
    ///
    /// Nodes are scored independently, in parallel.
    pub fn score(mut self, cost_function: CostFunction) -> ScoredCube {
        let totals = *self.totals();
        self.nodes.par_iter_mut().for_each(|node| {
            node.cost = cost_function.cost(&node.amounts, &totals);
        });
        tracing::debug!(
            algorithm = cost_function.name(),
            nodes = self.nodes.len(),
            "Scored cube nodes"
        );
        ScoredCube {
            cube: self,
            cost_function,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Dimensions in exploration order
    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    /// Number of levels below the root that hold nodes
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &CubeNode {
        &self.nodes[self.root.0]
    }

    pub fn node(&self, id: NodeId) -> &CubeNode {
        &self.nodes[id.0]
    }

    pub fn id_of(&self, values: &DimensionValues) -> Option<NodeId> {
        self.index.get(values).copied()
    }

    pub fn get(&self, values: &DimensionValues) -> Option<&CubeNode> {
        self.id_of(values).map(|id| self.node(id))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &CubeNode> {
        self.node(id).children.iter().map(move |child| self.node(*child))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CubeNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Amounts of the root aggregate
    pub fn totals(&self) -> &Amounts {
        &self.root().amounts
    }

    /// Kind of every row the cube was built from
    pub fn metric_kind(&self) -> MetricKind {
        self.totals().kind()
    }

    pub fn baseline_total(&self) -> f64 {
        self.root().baseline_value()
    }

    pub fn current_total(&self) -> f64 {
        self.root().current_value()
    }

    // ── Checks ───────────────────────────────────────────────────────

    /// Nodes whose values disagree with the sum of their children
    ///
    /// Each disagreement is logged as a warning.
    pub fn verify_additivity(&self) -> Vec<DimensionValues> {
        let mut violations = Vec::new();
        for node in self.nodes.iter().filter(|n| !n.children.is_empty()) {
            let mut children = Amounts::default();
            for id in &node.children {
                children += self.node(*id).amounts;
            }
            if !amounts_agree(&node.amounts, &children) {
                tracing::warn!(
                    values = %node.values,
                    baseline = node.amounts.baseline,
                    current = node.amounts.current,
                    child_baseline = children.baseline,
                    child_current = children.current,
                    "Cube node is not additive"
                );
                violations.push(node.values.clone());
            }
        }
        violations
    }

    /// Structural equality: same data at every position of both trees
    pub fn equal_hierarchy(&self, other: &Cube) -> bool {
        let mut stack = vec![(self.root, other.root)];
        while let Some((a, b)) = stack.pop() {
            let (left, right) = (self.node(a), other.node(b));
            if left.values != right.values
                || left.amounts != right.amounts
                || left.children.len() != right.children.len()
            {
                return false;
            }
            let left_parent = left.parent.map(|p| &self.node(p).values);
            let right_parent = right.parent.map(|p| &other.node(p).values);
            if left_parent != right_parent {
                return false;
            }
            stack.extend(left.children.iter().copied().zip(right.children.iter().copied()));
        }
        true
    }
}

/// A cube whose nodes carry their cost
#[derive(Clone, Debug)]
pub struct ScoredCube {
    cube: Cube,
    cost_function: CostFunction,
}

impl ScoredCube {
    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    pub fn cost_function(&self) -> &CostFunction {
        &self.cost_function
    }

    /// Whether the node carries enough of the overall change to be selected
    pub fn is_significant(&self, id: NodeId) -> bool {
        self.cost_function
            .is_significant(&self.cube.node(id).amounts, self.cube.totals())
    }

    pub fn into_cube(self) -> Cube {
        self.cube
    }
}

impl std::ops::Deref for ScoredCube {
    type Target = Cube;

    fn deref(&self) -> &Cube {
        &self.cube
    }
}

/// Order candidate nodes: cost desc, then `|change|` desc, then values
pub(crate) fn compare_candidates(a: &CubeNode, b: &CubeNode) -> Ordering {
    b.cost
        .total_cmp(&a.cost)
        .then_with(|| b.change().abs().total_cmp(&a.change().abs()))
        .then_with(|| a.values.cmp(&b.values))
}
