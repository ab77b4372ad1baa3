//! CLI module
//!
//! Provides command-line interface for:
//! - exhume: recover entities from a raw store dump
//! - churn: drive random lifecycle operations, optionally writing an image

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{churn, exhume, run, run_command};
pub use config::{ChurnConfig, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json, write_snapshot};
