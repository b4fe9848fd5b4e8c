//! CLI command implementations

pub mod analyze;
pub mod settings;
pub mod stages;
