//! Recovery error types
//!
//! Error codes:
//! - EXHUME_MALFORMED_CANDIDATE: no window around a tag decoded
//! - EXHUME_INCOMPLETE_ENTITY: a window decoded but its identifier is empty
//! - EXHUME_IO_ERROR: dump unreadable or snapshot unwritable (fatal)
//!
//! A tag that is simply absent from the rest of the buffer is not an error:
//! it ends that kind's scan normally.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::entries::EntityKind;

/// Result type for recovery operations
pub type ScanResult<T> = Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Every probed window around a tag failed to decode
    #[error("malformed {kind} candidate at offset {offset}: {reason}")]
    MalformedCandidate {
        kind: EntityKind,
        offset: usize,
        reason: String,
    },

    /// A window decoded but carries an empty identifier
    #[error("incomplete {kind} at offset {offset}: {reason}")]
    IncompleteEntity {
        kind: EntityKind,
        offset: usize,
        reason: ReportError,
    },

    /// The dump could not be read or the snapshot could not be written
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::MalformedCandidate { .. } => "EXHUME_MALFORMED_CANDIDATE",
            ScanError::IncompleteEntity { .. } => "EXHUME_INCOMPLETE_ENTITY",
            ScanError::Io { .. } => "EXHUME_IO_ERROR",
        }
    }

    /// Only I/O failures stop a whole recovery run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Io { .. })
    }
}

/// Why an extractor refused to report its held entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReportError {
    /// `report` called without a successfully decoded entity
    #[error("no entity held")]
    NothingHeld,

    /// Entity decoded with an empty identifier
    #[error("identifier is empty")]
    EmptyIdentifier,
}
