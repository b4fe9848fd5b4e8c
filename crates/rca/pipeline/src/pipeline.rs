//! Stages, their results and the context they read from

use crate::{FrameworkError, PipelineError};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Name of the implicit source holding the caller's input
pub const INPUT: &str = "INPUT";
/// Name of the stage whose result is the execution's result
pub const OUTPUT: &str = "OUTPUT";

/// One named unit of work in a pipeline graph
///
/// A stage declares the names it reads and the single name it writes. It
/// receives a [`PipelineContext`] holding at least every declared input.
#[async_trait]
pub trait Pipeline<E>: Send + Sync
where
    E: Send + Sync + 'static,
{
    /// Name this stage's result is stored under
    fn output_name(&self) -> &str;

    /// Names this stage reads: [`INPUT`] or other stages' output names
    fn input_names(&self) -> &BTreeSet<String>;

    async fn run(&self, context: PipelineContext<E>) -> Result<PipelineResult<E>, PipelineError>;
}

// ── PipelineResult ───────────────────────────────────────────────────

/// Entities produced by one stage
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineResult<E> {
    entities: Vec<E>,
}

impl<E> PipelineResult<E> {
    pub fn new(entities: Vec<E>) -> Self {
        Self { entities }
    }

    pub fn single(entity: E) -> Self {
        Self {
            entities: vec![entity],
        }
    }

    pub fn empty() -> Self {
        Self {
            entities: Vec::new(),
        }
    }

    pub fn entities(&self) -> &[E] {
        &self.entities
    }

    pub fn into_entities(self) -> Vec<E> {
        self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ── PipelineContext ──────────────────────────────────────────────────

/// Results completed so far, keyed by producing stage
///
/// Each key is written once. Stages receive a snapshot; results are shared,
/// not copied.
#[derive(Debug)]
pub struct PipelineContext<E> {
    results: HashMap<String, Arc<PipelineResult<E>>>,
}

impl<E> PipelineContext<E> {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
        }
    }

    /// Context holding only the caller's input
    pub fn with_input(input: Vec<E>) -> Self {
        let mut context = Self::new();
        context
            .results
            .insert(INPUT.to_string(), Arc::new(PipelineResult::new(input)));
        context
    }

    pub(crate) fn insert(
        &mut self,
        name: &str,
        result: Arc<PipelineResult<E>>,
    ) -> Result<(), FrameworkError> {
        if self.results.contains_key(name) {
            return Err(FrameworkError::DuplicateResult(name.to_string()));
        }
        self.results.insert(name.to_string(), result);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PipelineResult<E>> {
        self.results.get(name).map(Arc::as_ref)
    }

    pub(crate) fn get_shared(&self, name: &str) -> Option<Arc<PipelineResult<E>>> {
        self.results.get(name).cloned()
    }

    /// Result of `name`, or [`PipelineError::MissingInput`]
    pub fn require(&self, name: &str) -> Result<&PipelineResult<E>, PipelineError> {
        self.get(name)
            .ok_or_else(|| PipelineError::MissingInput(name.to_string()))
    }

    /// Entities of `name`; empty when the name is absent
    pub fn entities(&self, name: &str) -> &[E] {
        self.get(name).map(PipelineResult::entities).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    /// Completed names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.results.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<E> Clone for PipelineContext<E> {
    fn clone(&self) -> Self {
        Self {
            results: self.results.clone(),
        }
    }
}

impl<E> Default for PipelineContext<E> {
    fn default() -> Self {
        Self::new()
    }
}
