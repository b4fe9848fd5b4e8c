//! `rca stages`: the analysis graph in execution order

use crate::error::CliResult;
use crate::output::{print_structured, print_table, OutputFormat};
use rca_pipeline::Pipeline;
use rca_service::{analysis_graph, AnalysisError, InMemoryCubeFetcher};
use serde::Serialize;
use std::sync::Arc;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled)]
struct StageRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Inputs")]
    inputs: String,
}

pub fn execute(format: OutputFormat) -> CliResult<()> {
    let graph = analysis_graph(Arc::new(InMemoryCubeFetcher::default()))
        .map_err(AnalysisError::from)?;

    let rows: Vec<StageRow> = graph
        .topological_order()
        .iter()
        .enumerate()
        .map(|(index, name)| StageRow {
            position: index + 1,
            stage: name.clone(),
            inputs: graph
                .stage(name)
                .map(|stage| {
                    stage
                        .input_names()
                        .iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default(),
        })
        .collect();

    match format {
        OutputFormat::Table => print_table("Analysis stages", rows),
        _ => print_structured(&rows, format)?,
    }
    Ok(())
}
