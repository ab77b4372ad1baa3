//! exhume CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`, prints any error to
//! stderr and exits non-zero on failure. All logic lives in the CLI module.

use exhume::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
