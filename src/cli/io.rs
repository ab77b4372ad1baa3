//! Output handling for the CLI
//!
//! - stdout: exactly one JSON document per command
//! - stderr: log lines and the final error, if any

use std::io::{self, Write};

use serde::Serialize;

use crate::exhume::RecoveredStore;

use super::errors::CliResult;

/// Write the recovered snapshot to stdout
pub fn write_snapshot(store: &RecoveredStore) -> CliResult<()> {
    let stdout = io::stdout();
    store.write_json(stdout.lock())?;
    Ok(())
}

/// Write any serializable value to stdout as indented JSON
pub fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
