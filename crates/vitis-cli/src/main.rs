mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use vitis_cache::config::loader::load_config;
use vitis_cache::observability;

use cli::{Cli, Commands};
use output::{print_error, print_warning};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        // .env is optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    observability::init_tracing(&config.logging);
    if cli.verbose {
        if let Err(e) = observability::set_level("debug") {
            print_warning(&e);
        }
    }
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    match &cli.command {
        Commands::Stats => {
            let orchestrator = vitis_cache::build_orchestrator(&config).await?;
            commands::cache::stats(&orchestrator, format).await?;
        }
        Commands::Clear(args) => {
            let orchestrator = vitis_cache::build_orchestrator(&config).await?;
            commands::cache::clear(&orchestrator, args).await?;
        }
        Commands::Validate => {
            let orchestrator = vitis_cache::build_orchestrator(&config).await?;
            commands::files::validate(&orchestrator, format)?;
        }
        Commands::Endpoints => {
            let orchestrator = vitis_cache::build_orchestrator(&config).await?;
            commands::files::endpoints(&orchestrator, format)?;
        }
        Commands::Memo(args) => {
            let orchestrator = vitis_cache::build_orchestrator(&config).await?;
            commands::files::memo(&orchestrator, args, format)?;
        }
        Commands::Get(args) => {
            let pipeline = vitis_cache::build_pipeline(&config).await?;
            commands::data::get(&pipeline, &config, args, format).await?;
        }
    }

    Ok(())
}
