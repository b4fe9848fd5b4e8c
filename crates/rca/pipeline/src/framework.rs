//! Concurrent execution of a validated pipeline graph
//!
//! Stages are spawned on a caller-provided tokio runtime as soon as all of
//! their inputs have completed; independent stages run in parallel. Each
//! stage receives a snapshot of the context as it was when the stage was
//! scheduled. The first failure ends the execution: nothing further is
//! scheduled, running stages are detached and their results dropped.

use crate::graph::unresolved_inputs;
use crate::{
    FrameworkError, PipelineContext, PipelineError, PipelineGraph, PipelineResult, OUTPUT,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Wall-clock time spent in one stage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed: Duration,
}

/// A completed execution
#[derive(Debug)]
pub struct FrameworkExecution<E> {
    execution_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    context: PipelineContext<E>,
    output: Arc<PipelineResult<E>>,
    timings: Vec<StageTiming>,
}

impl<E> FrameworkExecution<E> {
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Every stage result, plus the input
    pub fn context(&self) -> &PipelineContext<E> {
        &self.context
    }

    /// Result of the `OUTPUT` stage
    pub fn output(&self) -> &PipelineResult<E> {
        &self.output
    }

    /// Per-stage timings, in completion order
    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    /// Stage names in the order they completed
    pub fn completion_order(&self) -> Vec<&str> {
        self.timings.iter().map(|t| t.stage.as_str()).collect()
    }
}

enum StageOutcome<E> {
    Completed(PipelineResult<E>),
    Failed(PipelineError),
    Panicked(String),
}

struct FinishedStage<E> {
    stage: String,
    elapsed: Duration,
    outcome: StageOutcome<E>,
}

/// Runs a validated graph on a tokio runtime
pub struct RcaFramework<E: Send + Sync + 'static> {
    graph: Arc<PipelineGraph<E>>,
    handle: Handle,
}

impl<E> RcaFramework<E>
where
    E: Send + Sync + 'static,
{
    /// Create a framework that spawns stages on `handle`
    pub fn new(graph: PipelineGraph<E>, handle: Handle) -> Self {
        Self {
            graph: Arc::new(graph),
            handle,
        }
    }

    pub fn graph(&self) -> &PipelineGraph<E> {
        &self.graph
    }

    /// Execute the graph once with `input` stored under `INPUT`
    pub async fn run(&self, input: Vec<E>) -> Result<FrameworkExecution<E>, FrameworkError> {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            execution_id = %execution_id,
            stages = self.graph.len(),
            "Pipeline execution started"
        );

        let mut context = PipelineContext::with_input(input);
        let mut waiting: HashMap<&str, usize> = HashMap::new();
        for name in self.graph.topological_order() {
            if let Some(stage) = self.graph.stage(name) {
                waiting.insert(name.as_str(), unresolved_inputs(stage.input_names()));
            }
        }

        let mut tasks: JoinSet<FinishedStage<E>> = JoinSet::new();
        for name in self.graph.topological_order() {
            if waiting.get(name.as_str()) == Some(&0) {
                self.spawn(&mut tasks, name, &context);
            }
        }

        let mut timings = Vec::with_capacity(self.graph.len());
        while let Some(joined) = tasks.join_next().await {
            let finished = match joined {
                Ok(finished) => finished,
                Err(join_error) => {
                    tasks.detach_all();
                    return Err(FrameworkError::Cancelled(join_error.to_string()));
                }
            };

            let result = match finished.outcome {
                StageOutcome::Completed(result) => result,
                StageOutcome::Failed(source) => {
                    tasks.detach_all();
                    tracing::error!(
                        execution_id = %execution_id,
                        stage = %finished.stage,
                        error = %source,
                        "Pipeline stage failed"
                    );
                    return Err(FrameworkError::StageFailed {
                        stage: finished.stage,
                        source,
                    });
                }
                StageOutcome::Panicked(message) => {
                    tasks.detach_all();
                    tracing::error!(
                        execution_id = %execution_id,
                        stage = %finished.stage,
                        message = %message,
                        "Pipeline stage panicked"
                    );
                    return Err(FrameworkError::StagePanicked {
                        stage: finished.stage,
                        message,
                    });
                }
            };

            tracing::debug!(
                execution_id = %execution_id,
                stage = %finished.stage,
                entities = result.len(),
                elapsed_ms = finished.elapsed.as_millis() as u64,
                "Pipeline stage completed"
            );
            if let Err(e) = context.insert(&finished.stage, Arc::new(result)) {
                tasks.detach_all();
                return Err(e);
            }

            for dependent in self.graph.dependents(&finished.stage) {
                if let Some(count) = waiting.get_mut(dependent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        self.spawn(&mut tasks, dependent, &context);
                    }
                }
            }
            timings.push(StageTiming {
                stage: finished.stage,
                elapsed: finished.elapsed,
            });
        }

        let output = context
            .get_shared(OUTPUT)
            .ok_or(FrameworkError::MissingOutput)?;
        let finished_at = Utc::now();
        tracing::info!(
            execution_id = %execution_id,
            stages = timings.len(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Pipeline execution completed"
        );

        Ok(FrameworkExecution {
            execution_id,
            started_at,
            finished_at,
            context,
            output,
            timings,
        })
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<FinishedStage<E>>,
        name: &str,
        context: &PipelineContext<E>,
    ) {
        let Some(stage) = self.graph.stage(name).cloned() else {
            return;
        };
        let snapshot = context.clone();
        let stage_name = name.to_string();

        tasks.spawn_on(
            async move {
                let started = Instant::now();
                let outcome = match AssertUnwindSafe(stage.run(snapshot)).catch_unwind().await {
                    Ok(Ok(result)) => StageOutcome::Completed(result),
                    Ok(Err(error)) => StageOutcome::Failed(error),
                    Err(panic) => StageOutcome::Panicked(panic_message(panic.as_ref())),
                };
                FinishedStage {
                    stage: stage_name,
                    elapsed: started.elapsed(),
                    outcome,
                }
            },
            &self.handle,
        );
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
