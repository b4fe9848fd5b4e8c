//! Local dataset files

use crate::error::{CliError, CliResult};
use rca_service::FactRecord;
use rca_types::AnalysisRequest;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An analysis request together with the facts it runs over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub request: AnalysisRequest,
    #[serde(default)]
    pub facts: Vec<FactRecord>,
}

impl Dataset {
    /// Load a dataset; the format follows the file extension
    pub fn load(path: &Path) -> CliResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => {
                let raw = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&raw)?)
            }
            Some("yaml") | Some("yml") => {
                let raw = std::fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&raw)?)
            }
            _ => Err(CliError::Dataset(format!(
                "unsupported dataset format '{}': use .json, .yaml or .yml",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"
request:
  metric: page_views
  dimensions: [country]
  current: { start: "2024-03-01T10:00:00Z", end: "2024-03-01T11:00:00Z" }
  baseline: { start: "2024-03-01T09:00:00Z", end: "2024-03-01T10:00:00Z" }
facts:
  - { timestamp: "2024-03-01T09:30:00Z", dimensions: { country: a }, value: 10 }
  - { timestamp: "2024-03-01T10:30:00Z", dimensions: { country: a }, value: 2 }
"#;

    #[test]
    fn test_yaml_dataset_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.yaml");
        std::fs::write(&path, DATASET).unwrap();

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.request.metric, "page_views");
        assert_eq!(dataset.request.dimensions.names(), &["country"]);
        assert_eq!(dataset.facts.len(), 2);
        assert_eq!(dataset.facts[1].value, 2.0);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = Dataset::load(Path::new("dataset.csv"));
        assert!(matches!(result, Err(CliError::Dataset(_))));
    }
}
