//! Dimension cube and top-K summarization
//!
//! Given aggregated rows for every combination of the explored dimensions,
//! this crate works out which combinations explain an observed change.
//!
//! # Architecture
//!
//! - [`CostFunction`]: scores a combination against the overall totals, for
//!   additive metrics and for ratio metrics given as numerator/denominator
//! - [`CostEntry`]: per-(dimension, value) statistics used to rank dimensions
//! - [`Cube`]: arena-backed tree of combinations, built bottom-up
//! - [`Summarizer`]: greedy top-K selection with `ALL` / `ALL_OTHERS` / `EMPTY`
//!   labels
//!
//! # Example
//!
//! ```rust
//! use rca_cube::{CostFunction, Cube, Summarizer, SummaryConfig};
//! use rca_types::{AggregateRow, DimensionValues, Dimensions};
//!
//! let dims = Dimensions::new(["country"]).unwrap();
//! let rows = vec![
//!     AggregateRow::root(100.0, 60.0),
//!     AggregateRow::new(DimensionValues::new(["a"]), 10.0, 2.0),
//!     AggregateRow::new(DimensionValues::new(["b"]), 90.0, 58.0),
//! ];
//!
//! let cube = Cube::build(dims, rows, 1).unwrap().score(CostFunction::default());
//! let report = Summarizer::new(SummaryConfig::new(1).unwrap())
//!     .summarize(&cube)
//!     .unwrap();
//!
//! assert_eq!(report.rows[0].label_strings(), vec!["a"]);
//! ```

#![deny(unsafe_code)]

pub mod cost;
pub mod cube;
pub mod entry;
pub mod gainers;
pub mod summary;

pub use cost::{
    correct_floating_point, snap_to_zero, weighted_contribution_to_overall_change,
    BalancedCostFunction, ContributionCostFunction, CostFunction, RatioCostFunction,
    CHANGE_CONTRIBUTION_THRESHOLD_PARAM, DEFAULT_CHANGE_CONTRIBUTION_THRESHOLD, EPSILON,
};
pub use cube::{Cube, CubeNode, NodeId, ScoredCube};
pub use entry::{
    calculate_sorted_dimension_costs, compute_one_dimension_costs, sort_dimensions, CostEntry,
};
pub use gainers::{gainers_and_losers, MAX_GAINER_LOSER_COUNT};
pub use summary::{Summarizer, SummaryConfig};
