//! RCA CLI - root-cause analysis of metric changes from the terminal
//!
//! This CLI lets analysts and developers:
//! - Explain a metric change recorded in a local dataset file
//! - Inspect the analysis stages and their execution order
//! - Check the effective analysis configuration

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod dataset;
mod error;
mod output;

use commands::{analyze, settings, stages};
pub use dataset::Dataset;
pub use error::{CliError, CliResult};
pub use output::{print_error, OutputFormat};

/// RCA CLI application
#[derive(Parser)]
#[command(name = "rca")]
#[command(about = "RCA - dimension root-cause analysis for metric changes", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "RCA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Explain the change recorded in a dataset file
    Analyze(analyze::AnalyzeArgs),

    /// Show the analysis stages in execution order
    Stages,

    /// Show the effective analysis configuration
    Config,
}

/// Run using the current process arguments.
pub async fn run() -> CliResult<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Logs go to stderr so structured output stays parseable
    let filter = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Analyze(args) => analyze::execute(args, config, cli.output).await,
        Commands::Stages => stages::execute(cli.output),
        Commands::Config => settings::execute(config, cli.output),
    }
}
