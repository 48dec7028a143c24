mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::CommandExecutor,
    config::AppConfig,
    error::{CliError, Result},
    output::OutputManager,
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::{io::IsTerminal, process};
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let output_format = args.output;

    if let Err(e) = run(args).await {
        match output_format {
            OutputFormat::Json => {
                let error_json = serde_json::json!({
                    "status": "error",
                    "message": e.to_string(),
                });
                println!("{error_json}");
            }
            OutputFormat::Pretty => {
                error!("Application error: {}", e);
                #[cfg(feature = "colored-output")]
                {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                #[cfg(not(feature = "colored-output"))]
                {
                    eprintln!("Error: {}", e);
                }
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let config = AppConfig::load(args.config.as_deref())?
        .with_overrides(args.base_url.as_deref(), args.token)?;
    debug!(base_url = %config.notify.base_url, "Effective configuration loaded");

    let colored = args.output == OutputFormat::Pretty && std::io::stdout().is_terminal();
    let executor = CommandExecutor::new(config, OutputManager::new(args.output, colored));

    match args.command {
        Commands::Watch => executor.watch().await?,
        Commands::List { unread } => executor.list(unread).await?,
        Commands::Read { id } => executor.read(&id).await?,
        Commands::ReadAll => executor.read_all().await?,
        Commands::Delete { id } => executor.delete(&id).await?,
        Commands::Config { show } => {
            if show {
                executor.show_config()?;
            } else {
                println!("Use --show to display the effective configuration");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}
