//! canvas-setup - CI job setup with content-addressed dependency caching
//!
//! CLI entry point that dispatches to subcommands.

use canvas_setup::cli::{Cli, Commands};
use canvas_setup::config::{Config, ConfigManager};
use canvas_setup::error::SetupResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // The post phase runs after the job's real work; it must never fail it
    let lenient = matches!(cli.command, Commands::Post(_));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if lenient => {
            eprintln!("{} {}", style("Warning:").yellow().bold(), e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> SetupResult<()> {
    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    if let Some(path) = config_manager.path() {
        debug!("Using config {}", path.display());
    }

    match cli.command {
        Commands::Pre(args) => canvas_setup::cli::commands::pre(args, &config).await,
        Commands::Post(args) => canvas_setup::cli::commands::post(args, &config).await,
        Commands::Hash { pattern } => canvas_setup::cli::commands::hash(pattern).await,
        Commands::Key {
            domain,
            pattern,
            version,
        } => canvas_setup::cli::commands::key(domain, pattern, version).await,
        Commands::Cache(args) => canvas_setup::cli::commands::cache(args, &config).await,
    }
}

/// 0 = info (every restore/save decision), 1 = debug, 2+ = trace
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("canvas_setup=info"),
        1 => EnvFilter::new("canvas_setup=debug"),
        _ => EnvFilter::new("canvas_setup=trace"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
