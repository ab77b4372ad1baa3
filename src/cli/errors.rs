//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit.

use std::fmt;
use std::io;

use crate::churn::ChurnError;
use crate::exhume::ScanError;
use crate::orchestrator::StoreError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file missing, unparsable or invalid
    ConfigError,
    /// Dump, image, stdout or stderr failed
    IoError,
    /// Strict mode stopped at least one kind
    ScanAborted,
    /// Churn run ended on a store error
    ChurnFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "EXHUME_CLI_CONFIG_ERROR",
            Self::IoError => "EXHUME_CLI_IO_ERROR",
            Self::ScanAborted => "EXHUME_CLI_SCAN_ABORTED",
            Self::ChurnFailed => "EXHUME_CLI_CHURN_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ScanError> for CliError {
    fn from(e: ScanError) -> Self {
        let code = if e.is_fatal() {
            CliErrorCode::IoError
        } else {
            CliErrorCode::ScanAborted
        };
        Self::new(code, format!("{} ({})", e, e.code()))
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::io_error(format!("{} ({})", e, e.code()))
    }
}

impl From<ChurnError> for CliError {
    fn from(e: ChurnError) -> Self {
        Self::new(
            CliErrorCode::ChurnFailed,
            format!("{} ({})", e, e.store_code()),
        )
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
