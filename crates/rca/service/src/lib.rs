//! Dimension analysis service
//!
//! Wires the cube engine into a pipeline graph:
//!
//! 1. fetch overall totals and per-dimension marginals
//! 2. rank dimensions by cost and pick the exploration order
//! 3. fetch the cube rows, build and score the cube
//! 4. summarize it, alongside the top single-dimension gainers and losers
//! 5. assemble a [`DimensionAnalysisReport`]
//!
//! Data comes from a [`CubeFetcher`]; [`InMemoryCubeFetcher`] serves local
//! datasets.

#![deny(unsafe_code)]

pub mod analyzer;
pub mod artifact;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod report;
pub mod stages;

pub use analyzer::DimensionAnalyzer;
pub use artifact::Artifact;
pub use config::{AnalysisConfig, AnalysisSettings};
pub use error::{AnalysisError, AnalysisResult, FetchError, FetchResult};
pub use fetcher::{CubeFetcher, FactRecord, InMemoryCubeFetcher};
pub use report::DimensionAnalysisReport;
pub use stages::analysis_graph;
