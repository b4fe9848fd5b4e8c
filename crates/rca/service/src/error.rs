//! Error types for dimension analysis

use rca_pipeline::{FrameworkError, IllegalGraphError};
use rca_types::RcaError;
use thiserror::Error;

/// Failure of the data source behind a [`crate::CubeFetcher`]
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Rca(#[from] RcaError),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Dimension analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The analyzer's configuration is unusable
    #[error("Invalid analysis configuration: {0}")]
    Config(RcaError),

    /// Configuration sources could not be read or merged
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// The request was rejected before any computation
    #[error("Invalid analysis request: {0}")]
    InvalidRequest(RcaError),

    /// The analysis graph failed validation
    #[error(transparent)]
    Graph(#[from] IllegalGraphError),

    /// A named stage failed; no partial report is produced
    #[error("Analysis stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        source: FrameworkError,
    },

    /// Execution failed outside any single stage
    #[error("Analysis execution failed: {0}")]
    Execution(FrameworkError),

    /// The OUTPUT stage produced no report
    #[error("Analysis produced no report")]
    MissingReport,
}

impl AnalysisError {
    /// Name of the failing stage, if the failure came from one
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage.as_str()),
            _ => None,
        }
    }
}

impl From<FrameworkError> for AnalysisError {
    fn from(error: FrameworkError) -> Self {
        match error.stage() {
            Some(stage) => Self::Stage {
                stage: stage.to_string(),
                source: error,
            },
            None => Self::Execution(error),
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rca_pipeline::PipelineError;

    #[test]
    fn test_stage_failures_keep_the_stage_name() {
        let error = AnalysisError::from(FrameworkError::StageFailed {
            stage: "cube".to_string(),
            source: PipelineError::failed(RcaError::MissingRootAggregate),
        });
        assert_eq!(error.stage(), Some("cube"));
        assert!(error.to_string().contains("cube"));
        assert!(error.to_string().contains("root aggregate"));
    }

    #[test]
    fn test_stageless_failures_map_to_execution() {
        let error = AnalysisError::from(FrameworkError::MissingOutput);
        assert!(matches!(error, AnalysisError::Execution(_)));
        assert_eq!(error.stage(), None);
    }
}
