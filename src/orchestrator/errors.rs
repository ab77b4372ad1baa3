//! Orchestrator error types
//!
//! Error codes:
//! - CHURN_STORE_NOT_FOUND: read transaction could not find an entity
//! - CHURN_STORE_UNAVAILABLE: read transaction could not run
//! - CHURN_IMAGE_IO_ERROR: store image could not be written
//! - CHURN_OP_NO_SPACE / CHURN_OP_BUSY / CHURN_OP_NOT_FOUND /
//!   CHURN_OP_INJECTED_FAULT: operation runner refused or failed

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::entries::EntityKind;

/// Result type for store reads and image writes
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for the operation runner
pub type OperationResult<T> = Result<T, OperationError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "CHURN_STORE_NOT_FOUND",
            StoreError::Unavailable(_) => "CHURN_STORE_UNAVAILABLE",
            StoreError::Io { .. } => "CHURN_IMAGE_IO_ERROR",
        }
    }
}

/// Why a lifecycle operation did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Not enough devices with free space on distinct nodes
    #[error("no space for {replicas} bricks of size {size}")]
    NoSpace { size: u64, replicas: u32 },

    /// Target has dependents that must go first
    #[error("{id} is busy: {reason}")]
    Busy { id: String, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// Fault source failed the operation after its pending entry was written
    #[error("injected fault during {operation}")]
    InjectedFault { operation: &'static str },
}

impl OperationError {
    pub fn code(&self) -> &'static str {
        match self {
            OperationError::NoSpace { .. } => "CHURN_OP_NO_SPACE",
            OperationError::Busy { .. } => "CHURN_OP_BUSY",
            OperationError::NotFound { .. } => "CHURN_OP_NOT_FOUND",
            OperationError::InjectedFault { .. } => "CHURN_OP_INJECTED_FAULT",
        }
    }
}
