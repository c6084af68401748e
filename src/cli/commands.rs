//! CLI commands and argument parsing

use crate::types::RecordErrorPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Harvest author usernames from the sampled stream
#[derive(Parser, Debug)]
#[command(name = "stream-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream usernames into the dataset (reads BEARER_TOKEN)
    Ingest {
        /// Stop after this many connection attempts (default: reconnect
        /// until interrupted)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_attempts: Option<u64>,

        /// Dataset file to append to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stream endpoint
        #[arg(long)]
        url: Option<String>,

        /// What to do with a record that has no username
        #[arg(long, value_enum)]
        on_record_error: Option<RecordErrorPolicy>,

        /// Seconds of silence before the connection is treated as dead
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        read_timeout: Option<u64>,
    },

    /// Remove duplicate rows from the dataset
    Dedupe {
        /// Dataset file to rewrite
        #[arg(short, long)]
        dataset: Option<PathBuf>,
    },
}
