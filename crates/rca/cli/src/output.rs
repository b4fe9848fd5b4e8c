//! Output formatting utilities

use crate::error::CliResult;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Print a single item as JSON or YAML
pub fn print_structured<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(data)?),
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?)
        }
    }
    Ok(())
}

/// Print rows as a table under a heading
pub fn print_table<T: Tabled>(title: &str, rows: Vec<T>) {
    println!("{}", title.bold().cyan());
    if rows.is_empty() {
        println!("  {}", "None".dimmed());
    } else {
        println!("{}", Table::new(rows));
    }
    println!();
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Render an optional percentage
pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2}%", value),
        None => "-".to_string(),
    }
}

/// Render a metric value
pub fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}
