//! uiflow CLI - Main Entry Point
//!
//! Runs declarative browser scenarios against the configured target
//! environments and reports per-scenario outcomes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{list, run, validate};
use uiflow_e2e::HarnessConfig;

/// uiflow - declarative UI-flow testing over WebDriver
#[derive(Parser)]
#[command(name = "uiflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "UIFLOW_CONFIG", default_value = uiflow_e2e::config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios and report outcomes
    Run(run::RunArgs),

    /// List selected scenarios in execution order
    List(list::ListArgs),

    /// Parse every scenario file and check targets
    Validate(validate::ValidateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    // 0: all passed, 1: a scenario failed or errored, 2: the harness could not run
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            2
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    let config = HarnessConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await,
        Commands::List(args) => list::execute(args, config, cli.format),
        Commands::Validate(args) => validate::execute(args, config),
    }
}
