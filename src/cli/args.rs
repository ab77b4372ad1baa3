//! CLI argument definitions using clap
//!
//! Commands:
//! - exhume --dump <path> [--strict] [--kind <kind>...] [--config <path>]
//! - churn --passes <n> [--seed <s>] [--image <path>] [--fault-rate <f>] [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::entries::EntityKind;

/// Forensic recovery and chaos churn for a storage-cluster store
#[derive(Parser, Debug)]
#[command(name = "exhume")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recover entities from a raw store dump and print them as JSON
    Exhume {
        /// Raw byte dump of the store file
        #[arg(long)]
        dump: PathBuf,

        /// Stop scanning a kind at its first unrecoverable candidate
        #[arg(long)]
        strict: bool,

        /// Only scan these kinds (repeatable)
        #[arg(long = "kind", value_parser = parse_kind)]
        kinds: Vec<EntityKind>,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Drive random lifecycle operations against an in-memory cluster
    Churn {
        /// Number of passes to run
        #[arg(long)]
        passes: u32,

        /// Random seed; overrides the config file
        #[arg(long)]
        seed: Option<u64>,

        /// Write the final store image here
        #[arg(long)]
        image: Option<PathBuf>,

        /// Probability that an operation fails mid-flight
        #[arg(long)]
        fault_rate: Option<f64>,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    s.parse()
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
