//! Bulkload command-line entry point.

mod app;
mod cli;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so progress lines on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Upload {
            file,
            endpoint,
            chunk_size,
            concurrency,
            timeout_secs,
        } => {
            config.apply_overrides(endpoint, chunk_size, concurrency, timeout_secs);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(app::upload(&file, config))
        }
        Commands::Plan { file, chunk_size } => {
            app::plan(&file, chunk_size.unwrap_or(config.chunk_size))
        }
    }
}
