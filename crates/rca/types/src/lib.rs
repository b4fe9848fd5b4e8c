//! Domain types for dimension root-cause attribution
//!
//! These types are shared by the cube engine, the pipeline stages and the
//! command line front end:
//!
//! - [`DimensionValues`] / [`Dimensions`]: coordinates of cube nodes
//! - [`AggregateRow`] / [`DimensionRow`]: what the data-fetch boundary returns
//! - [`Amounts`] / [`MetricKind`]: additive values or ratio numerators and denominators
//! - [`AnalysisRequest`] / [`TimeInterval`]: what the caller asks to explain
//! - [`SummaryReport`] / [`SummaryRow`] / [`SummaryLabel`]: what comes back

#![deny(unsafe_code)]

pub mod dimension;
pub mod error;
pub mod metric;
pub mod request;
pub mod row;
pub mod summary;

pub use dimension::{DimensionValues, Dimensions};
pub use error::{RcaError, RcaResult};
pub use metric::{Amounts, Denominators, MetricKind, RATIO_EPSILON};
pub use request::{AnalysisRequest, TimeInterval};
pub use row::{AggregateRow, DimensionRow};
pub use summary::{
    DimensionCost, GainerLoserRow, SummaryLabel, SummaryReport, SummaryRow, ALL_LABEL,
    ALL_OTHERS_LABEL, EMPTY_LABEL,
};
