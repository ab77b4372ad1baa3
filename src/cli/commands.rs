//! CLI command implementations
//!
//! Both commands load the optional config, apply flag overrides, set the
//! log floor, then do their work and print one JSON document to stdout.

use std::path::{Path, PathBuf};

use crate::churn::Churn;
use crate::entries::EntityKind;
use crate::exhume::{recover_file, ScanMode};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::orchestrator::{write_image, MemoryOrchestrator};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{write_json, write_snapshot};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Exhume {
            dump,
            strict,
            kinds,
            config,
        } => exhume(&dump, strict, kinds, config.as_deref()),
        Command::Churn {
            passes,
            seed,
            image,
            fault_rate,
            config,
        } => churn(passes, seed, image, fault_rate, config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<Config> {
    let config = Config::load_or_default(path)?;
    Logger::set_min_severity(config.log_level);

    let source = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    log_event_with_fields(Event::ConfigLoaded, &[("source", &source)]);
    Ok(config)
}

/// Recover a dump and print the snapshot.
///
/// The snapshot is printed even when strict mode stopped a kind; the abort
/// is then returned so the process exits non-zero.
pub fn exhume(
    dump: &Path,
    strict: bool,
    kinds: Vec<EntityKind>,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let mut options = config.recovery_options()?;
    if strict {
        options.mode = ScanMode::Strict;
    }
    if !kinds.is_empty() {
        options.kinds = kinds;
    }

    let run = recover_file(dump, &options)?;
    write_snapshot(&run.store)?;

    let aborted: Vec<String> = run.aborted().map(|e| e.to_string()).collect();
    if !aborted.is_empty() {
        return Err(CliError::new(
            CliErrorCode::ScanAborted,
            format!("{} kind(s) aborted: {}", aborted.len(), aborted.join("; ")),
        ));
    }
    Ok(())
}

/// Churn an in-memory cluster and print the report.
pub fn churn(
    passes: u32,
    seed: Option<u64>,
    image: Option<PathBuf>,
    fault_rate: Option<f64>,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let mut churn_config = config.churn;
    if let Some(seed) = seed {
        churn_config.seed = seed;
    }
    if let Some(rate) = fault_rate {
        churn_config.fault_rate = rate;
    }
    churn_config.validate()?;

    let mut orch = MemoryOrchestrator::new(&churn_config.memory_config());
    let report = Churn::seeded(churn_config.seed).run(&mut orch, passes)?;

    if let Some(path) = image {
        write_image(&path, &orch)?;
    }
    write_json(&report)
}
