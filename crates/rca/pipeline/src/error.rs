//! Error types for pipeline graphs and their execution

use thiserror::Error;

/// A pipeline graph that cannot be executed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalGraphError {
    /// Two stages share an output name
    #[error("Illegal graph: duplicate pipeline name '{0}'")]
    DuplicateName(String),

    /// A stage uses a name reserved by the framework
    #[error("Illegal graph: pipeline name '{0}' is reserved")]
    ReservedName(String),

    /// A stage has a blank output name
    #[error("Illegal graph: pipeline name must not be blank")]
    EmptyName,

    /// A stage depends on something that nothing produces
    #[error("Illegal graph: pipeline '{stage}' depends on unknown input '{input}'")]
    UnknownInput { stage: String, input: String },

    /// No stage produces the final result
    #[error("Illegal graph: no pipeline named OUTPUT")]
    MissingOutput,

    /// Stages that transitively depend on their own output
    #[error("Illegal graph: cycle among pipelines {0:?}")]
    Cycle(Vec<String>),

    /// Stages whose results never reach OUTPUT
    #[error("Illegal graph: pipelines {0:?} have no path to OUTPUT")]
    Unreachable(Vec<String>),
}

/// Failure reported by a stage's own `run`
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A declared input is absent from the context
    #[error("Missing input '{0}'")]
    MissingInput(String),

    /// An input holds entities of an unexpected kind
    #[error("Unexpected entity in '{0}'")]
    UnexpectedEntity(String),

    /// Anything else the stage ran into
    #[error("{0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    /// Wrap any error raised inside a stage
    pub fn failed(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Failed(error.into())
    }
}

/// Failure of a whole execution
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// A stage returned an error; nothing downstream ran
    #[error("Pipeline '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        source: PipelineError,
    },

    /// A stage panicked
    #[error("Pipeline '{stage}' panicked: {message}")]
    StagePanicked { stage: String, message: String },

    /// A stage name was written to the context twice
    #[error("Pipeline '{0}' produced a result twice")]
    DuplicateResult(String),

    /// Execution drained without an OUTPUT result
    #[error("Execution finished without an OUTPUT result")]
    MissingOutput,

    /// A stage task was cancelled by its runtime
    #[error("Pipeline task cancelled: {0}")]
    Cancelled(String),
}

impl FrameworkError {
    /// Name of the stage that caused the failure, if any
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. } | Self::StagePanicked { stage, .. } => {
                Some(stage.as_str())
            }
            Self::DuplicateResult(stage) => Some(stage.as_str()),
            Self::MissingOutput | Self::Cancelled(_) => None,
        }
    }
}
