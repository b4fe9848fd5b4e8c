//! Configuration for dimension analysis

use rca_cube::{CostFunction, SummaryConfig};
use rca_types::{AnalysisRequest, RcaError, RcaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Prefix of environment variables overriding the configuration
pub const ENV_PREFIX: &str = "RCA";

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Cost function name (`balanced` or `contribution`)
    pub algorithm: String,

    /// Cost function parameters, e.g. `change_contribution_threshold`
    pub params: HashMap<String, String>,

    /// Number of dimensions explored
    pub max_depth: usize,

    /// Rows selected per level
    pub top_k: usize,

    /// Only select nodes moving in the same direction as the total
    pub one_side_error: bool,

    /// Levels the summary explores; unset explores every dimension
    pub level_count: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            algorithm: CostFunction::BALANCED.to_string(),
            params: HashMap::new(),
            max_depth: 3,
            top_k: 4,
            one_side_error: false,
            level_count: None,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration
    ///
    /// Sources, lowest precedence first: built-in defaults, the file at
    /// `path` (format taken from its extension), `RCA_`-prefixed
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration, reading overrides from `<prefix>_`-prefixed
    /// environment variables
    pub fn load_with_prefix(
        path: Option<&Path>,
        prefix: &str,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&AnalysisConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(config::Environment::with_prefix(prefix).try_parsing(true));

        builder.build()?.try_deserialize()
    }

    /// Check the configuration and build its cost function
    pub fn validate(&self) -> RcaResult<CostFunction> {
        if self.max_depth == 0 {
            return Err(RcaError::Configuration(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(RcaError::Configuration(
                "top_k must be at least 1".to_string(),
            ));
        }
        CostFunction::from_config(&self.algorithm, &self.params)
    }

    /// Settings for one request, applying its overrides
    pub fn settings_for(&self, request: &AnalysisRequest) -> RcaResult<AnalysisSettings> {
        let cost_function = self.validate()?.for_metric(request.metric_kind);
        let top_k = request.summary_size.unwrap_or(self.top_k);
        let mut summary = SummaryConfig::new(top_k)?.with_one_side_error(self.one_side_error);
        if let Some(level_count) = self.level_count {
            summary = summary.with_level_count(level_count);
        }

        Ok(AnalysisSettings {
            cost_function,
            depth: request.depth.unwrap_or(self.max_depth),
            summary,
        })
    }
}

/// Fully resolved settings of one analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub cost_function: CostFunction,
    /// Number of dimensions explored
    pub depth: usize,
    pub summary: SummaryConfig,
}
