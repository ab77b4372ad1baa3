//! Raw-store recovery ("exhume")
//!
//! Reconstructs entity records straight from the bytes of a store file that
//! can no longer be opened, whether truncated, torn or overwritten in
//! places. Nothing here reads the store through its own API.
//!
//! - One extractor per entity kind knows the kind's tag and size bounds
//! - The scan loop walks the buffer from tag to tag, probing windows
//! - Recovered entities land in one accumulator keyed by kind and id
//!
//! Correctness is heuristic: a recovered entity parsed structurally and has
//! a non-empty identifier, nothing more.

mod errors;
mod extractor;
mod recovered;
mod run;
mod scan;

pub use errors::{ReportError, ScanError, ScanResult};
pub use extractor::{
    anchor, extractor_for, Anchor, EntryExtractor, Extract, Reported, WindowBounds,
    BASE_MAX_WINDOW, MIN_WINDOW,
};
pub use recovered::{RecoveredEntity, RecoveredStore};
pub use run::{recover, recover_file, RecoveryOptions, RecoveryRun};
pub use scan::{exhume, CandidateFailure, FailureKind, KindReport, ScanMode};
