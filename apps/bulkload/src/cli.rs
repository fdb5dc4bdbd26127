use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "Chunked bulk record uploader", long_about = None)]
pub struct Cli {
    /// Config file (TOML). Defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a sheet export to the bulk-upload endpoint
    Upload {
        /// JSON row export of the sheet
        file: PathBuf,

        /// Endpoint URL, overrides the config file
        #[arg(long)]
        endpoint: Option<String>,

        /// Records per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Maximum chunks in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-chunk request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Parse and partition a file without sending anything
    Plan {
        file: PathBuf,

        #[arg(long)]
        chunk_size: Option<usize>,
    },
}
