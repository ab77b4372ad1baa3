//! Churn error types
//!
//! Operation runner failures are not errors at this level: they are logged
//! and recorded in the report. Only a failed read transaction ends a run.

use thiserror::Error;

use crate::orchestrator::StoreError;

/// Result type for churn runs
pub type ChurnResult<T> = Result<T, ChurnError>;

#[derive(Debug, Error)]
pub enum ChurnError {
    /// Listing or selecting a victim failed
    #[error("store read failed during pass {pass}: {source}")]
    Store {
        pass: u32,
        #[source]
        source: StoreError,
    },
}

impl ChurnError {
    pub fn code(&self) -> &'static str {
        match self {
            ChurnError::Store { .. } => "CHURN_STORE_ERROR",
        }
    }

    /// Underlying store error code
    pub fn store_code(&self) -> &'static str {
        match self {
            ChurnError::Store { source, .. } => source.code(),
        }
    }
}
