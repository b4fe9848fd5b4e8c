//! `rca config`: the effective analysis configuration

use crate::error::CliResult;
use crate::output::{print_structured, print_table, OutputFormat};
use rca_service::{AnalysisConfig, AnalysisError};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl SettingRow {
    fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

pub fn execute(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let config = AnalysisConfig::load(config_path).map_err(AnalysisError::from)?;
    let cost_function = config.validate().map_err(AnalysisError::Config)?;

    match format {
        OutputFormat::Table => {
            let rows = vec![
                SettingRow::new("algorithm", cost_function.name()),
                SettingRow::new(
                    "change_contribution_threshold",
                    cost_function.change_contribution_threshold(),
                ),
                SettingRow::new("max_depth", config.max_depth),
                SettingRow::new("top_k", config.top_k),
                SettingRow::new("one_side_error", config.one_side_error),
                SettingRow::new(
                    "level_count",
                    config
                        .level_count
                        .map(|count| count.to_string())
                        .unwrap_or_else(|| "all".to_string()),
                ),
            ];
            print_table("Analysis configuration", rows);
        }
        _ => print_structured(&config, format)?,
    }
    Ok(())
}
