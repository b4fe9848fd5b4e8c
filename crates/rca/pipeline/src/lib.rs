//! Pipeline DAG framework
//!
//! Analysis work is split into named stages ([`Pipeline`]s). Each stage
//! declares the names it reads and the single name it writes; together they
//! form a directed acyclic graph from the implicit [`INPUT`] to the
//! mandatory [`OUTPUT`] stage.
//!
//! # Lifecycle
//!
//! 1. **Unvalidated**: stages are collected by a [`PipelineGraphBuilder`]
//! 2. **Validated**: [`PipelineGraphBuilder::build`] returns a
//!    [`PipelineGraph`] or an [`IllegalGraphError`]
//! 3. **Executing**: [`RcaFramework::run`] spawns stages as their inputs
//!    complete
//! 4. **Completed**: a [`FrameworkExecution`] holds every result, or the run
//!    fails with the failing stage's name attached
//!
//! Stage implementations are trait objects; the framework never knows which
//! concrete stage it runs.

#![deny(unsafe_code)]

pub mod error;
pub mod framework;
pub mod graph;
pub mod pipeline;

pub use error::{FrameworkError, IllegalGraphError, PipelineError};
pub use framework::{FrameworkExecution, RcaFramework, StageTiming};
pub use graph::{PipelineGraph, PipelineGraphBuilder};
pub use pipeline::{Pipeline, PipelineContext, PipelineResult, INPUT, OUTPUT};
