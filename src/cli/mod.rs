//! CLI module
//!
//! Command-line interface for the two operations.
//!
//! # Commands
//!
//! - `ingest` - Stream usernames into the dataset
//! - `dedupe` - Remove duplicate rows from the dataset

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
