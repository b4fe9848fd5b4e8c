//! Pipeline graphs: registration and validation
//!
//! A [`PipelineGraphBuilder`] collects stages without checking anything.
//! [`PipelineGraphBuilder::build`] validates the whole graph once and returns
//! an immutable [`PipelineGraph`]; an invalid graph never reaches execution.

use crate::{IllegalGraphError, Pipeline, INPUT, OUTPUT};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

// ── Builder ──────────────────────────────────────────────────────────

/// Unvalidated set of stages
pub struct PipelineGraphBuilder<E: Send + Sync + 'static> {
    stages: Vec<Arc<dyn Pipeline<E>>>,
}

impl<E> PipelineGraphBuilder<E>
where
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Register a stage
    pub fn with_stage(mut self, stage: impl Pipeline<E> + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Register an already shared stage
    pub fn with_shared_stage(mut self, stage: Arc<dyn Pipeline<E>>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn add_stage(&mut self, stage: impl Pipeline<E> + 'static) -> &mut Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Validate the graph
    ///
    /// Checks, in order: names are unique, non-blank and not `INPUT`; every
    /// input resolves; an `OUTPUT` stage exists; there is no cycle; every
    /// stage reaches `OUTPUT`.
    pub fn build(self) -> Result<PipelineGraph<E>, IllegalGraphError> {
        let mut stages: HashMap<String, Arc<dyn Pipeline<E>>> = HashMap::new();
        for stage in self.stages {
            let name = stage.output_name().to_string();
            if name.trim().is_empty() {
                return Err(IllegalGraphError::EmptyName);
            }
            if name == INPUT {
                return Err(IllegalGraphError::ReservedName(name));
            }
            if stages.contains_key(&name) {
                return Err(IllegalGraphError::DuplicateName(name));
            }
            stages.insert(name, stage);
        }

        // Sorted for stable error reporting
        let mut names: Vec<&String> = stages.keys().collect();
        names.sort();

        for name in &names {
            for input in stages[*name].input_names() {
                if input != INPUT && !stages.contains_key(input) {
                    return Err(IllegalGraphError::UnknownInput {
                        stage: (*name).clone(),
                        input: input.clone(),
                    });
                }
            }
        }

        if !stages.contains_key(OUTPUT) {
            return Err(IllegalGraphError::MissingOutput);
        }

        let dependents = dependents_of(&stages);
        let order = topological_order(&stages, &dependents)?;

        let contributing = reaching(&stages, OUTPUT);
        let unreachable: Vec<String> = names
            .iter()
            .filter(|name| !contributing.contains(name.as_str()))
            .map(|name| (*name).clone())
            .collect();
        if !unreachable.is_empty() {
            return Err(IllegalGraphError::Unreachable(unreachable));
        }

        tracing::debug!(stages = order.len(), order = ?order, "Validated pipeline graph");

        Ok(PipelineGraph {
            stages,
            dependents,
            order,
        })
    }
}

impl<E> Default for PipelineGraphBuilder<E>
where
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Stage name → stages that read it (INPUT excluded)
fn dependents_of<E>(
    stages: &HashMap<String, Arc<dyn Pipeline<E>>>,
) -> HashMap<String, Vec<String>>
where
    E: Send + Sync + 'static,
{
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for (name, stage) in stages {
        for input in stage.input_names() {
            if input != INPUT {
                dependents
                    .entry(input.clone())
                    .or_default()
                    .push(name.clone());
            }
        }
    }
    for readers in dependents.values_mut() {
        readers.sort();
    }
    dependents
}

/// Kahn's algorithm; ready stages are taken in name order
fn topological_order<E>(
    stages: &HashMap<String, Arc<dyn Pipeline<E>>>,
    dependents: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>, IllegalGraphError>
where
    E: Send + Sync + 'static,
{
    let mut pending: HashMap<&str, usize> = stages
        .iter()
        .map(|(name, stage)| (name.as_str(), unresolved_inputs(stage.input_names())))
        .collect();
    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(stages.len());
    while let Some(name) = ready.pop_first() {
        pending.remove(name);
        order.push(name.to_string());
        for reader in dependents.get(name).into_iter().flatten() {
            if let Some(count) = pending.get_mut(reader.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(reader.as_str());
                }
            }
        }
    }

    if !pending.is_empty() {
        let mut cyclic: Vec<String> = pending.keys().map(|name| name.to_string()).collect();
        cyclic.sort();
        return Err(IllegalGraphError::Cycle(cyclic));
    }
    Ok(order)
}

/// Stages whose result flows into `target`, including `target` itself
fn reaching<'a, E>(
    stages: &'a HashMap<String, Arc<dyn Pipeline<E>>>,
    target: &'a str,
) -> HashSet<&'a str>
where
    E: Send + Sync + 'static,
{
    let mut visited = HashSet::new();
    let mut queue = vec![target];

    while let Some(current) = queue.pop() {
        if visited.insert(current) {
            if let Some(stage) = stages.get(current) {
                for input in stage.input_names() {
                    if input != INPUT && !visited.contains(input.as_str()) {
                        queue.push(input.as_str());
                    }
                }
            }
        }
    }
    visited
}

pub(crate) fn unresolved_inputs(inputs: &BTreeSet<String>) -> usize {
    inputs.iter().filter(|input| *input != INPUT).count()
}

// ── Validated graph ──────────────────────────────────────────────────

/// A validated, immutable pipeline graph
pub struct PipelineGraph<E: Send + Sync + 'static> {
    stages: HashMap<String, Arc<dyn Pipeline<E>>>,
    dependents: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

impl<E> PipelineGraph<E>
where
    E: Send + Sync + 'static,
{
    pub fn builder() -> PipelineGraphBuilder<E> {
        PipelineGraphBuilder::new()
    }

    pub fn stage(&self, name: &str) -> Option<&Arc<dyn Pipeline<E>>> {
        self.stages.get(name)
    }

    /// Stages that read `name`, sorted
    pub fn dependents(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One valid execution order, deterministic for a given graph
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<E> std::fmt::Debug for PipelineGraph<E>
where
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineGraph")
            .field("order", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PipelineContext, PipelineError, PipelineResult};
    use async_trait::async_trait;

    struct Stage {
        name: String,
        inputs: BTreeSet<String>,
    }

    impl Stage {
        fn new(name: &str, inputs: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl Pipeline<u32> for Stage {
        fn output_name(&self) -> &str {
            &self.name
        }

        fn input_names(&self) -> &BTreeSet<String> {
            &self.inputs
        }

        async fn run(
            &self,
            _context: PipelineContext<u32>,
        ) -> Result<PipelineResult<u32>, PipelineError> {
            Ok(PipelineResult::empty())
        }
    }

    fn build(stages: Vec<Stage>) -> Result<PipelineGraph<u32>, IllegalGraphError> {
        let mut builder = PipelineGraphBuilder::new();
        for stage in stages {
            builder.add_stage(stage);
        }
        builder.build()
    }

    #[test]
    fn test_linear_graph_order() {
        let graph = build(vec![
            Stage::new(OUTPUT, &["B"]),
            Stage::new("B", &["A"]),
            Stage::new("A", &[INPUT]),
        ])
        .unwrap();
        assert_eq!(graph.topological_order(), &["A", "B", OUTPUT]);
        assert_eq!(graph.dependents("A"), &["B"]);
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_stage_without_inputs_starts_the_graph() {
        let graph = build(vec![
            Stage::new("A", &[]),
            Stage::new("B", &["A"]),
            Stage::new(OUTPUT, &["B"]),
        ])
        .unwrap();
        assert_eq!(graph.topological_order(), &["A", "B", OUTPUT]);
        assert!(graph.stage("A").unwrap().input_names().is_empty());
    }

    #[test]
    fn test_diamond_graph_is_valid() {
        let graph = build(vec![
            Stage::new("fetch", &[INPUT]),
            Stage::new("left", &["fetch"]),
            Stage::new("right", &["fetch"]),
            Stage::new(OUTPUT, &["left", "right", INPUT]),
        ])
        .unwrap();
        assert_eq!(
            graph.topological_order(),
            &["fetch", "left", "right", OUTPUT]
        );
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let result = build(vec![
            Stage::new("A", &[INPUT]),
            Stage::new("A", &[INPUT]),
            Stage::new(OUTPUT, &["A"]),
        ]);
        assert!(matches!(result, Err(IllegalGraphError::DuplicateName(name)) if name == "A"));

        let result = build(vec![
            Stage::new(OUTPUT, &[INPUT]),
            Stage::new(OUTPUT, &[INPUT]),
        ]);
        assert!(matches!(result, Err(IllegalGraphError::DuplicateName(_))));
    }

    #[test]
    fn test_reserved_and_blank_names_are_rejected() {
        let result = build(vec![Stage::new(INPUT, &[]), Stage::new(OUTPUT, &[INPUT])]);
        assert!(matches!(result, Err(IllegalGraphError::ReservedName(_))));

        let result = build(vec![Stage::new(" ", &[]), Stage::new(OUTPUT, &[INPUT])]);
        assert!(matches!(result, Err(IllegalGraphError::EmptyName)));
    }

    #[test]
    fn test_dangling_input_is_rejected() {
        let result = build(vec![Stage::new(OUTPUT, &["missing"])]);
        assert_eq!(
            result.unwrap_err(),
            IllegalGraphError::UnknownInput {
                stage: OUTPUT.to_string(),
                input: "missing".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_output_is_rejected() {
        let result = build(vec![Stage::new("A", &[INPUT])]);
        assert!(matches!(result, Err(IllegalGraphError::MissingOutput)));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let result = build(vec![
            Stage::new("A", &["B"]),
            Stage::new("B", &["A"]),
            Stage::new(OUTPUT, &["B"]),
        ]);
        assert_eq!(
            result.unwrap_err(),
            IllegalGraphError::Cycle(vec!["A".to_string(), "B".to_string(), OUTPUT.to_string()])
        );

        let result = build(vec![Stage::new(OUTPUT, &[OUTPUT])]);
        assert!(matches!(result, Err(IllegalGraphError::Cycle(_))));
    }

    #[test]
    fn test_orphan_branch_is_rejected() {
        let result = build(vec![
            Stage::new("A", &[INPUT]),
            Stage::new("orphan", &["A"]),
            Stage::new(OUTPUT, &["A"]),
        ]);
        assert_eq!(
            result.unwrap_err(),
            IllegalGraphError::Unreachable(vec!["orphan".to_string()])
        );
    }
}
