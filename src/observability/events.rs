//! Observable events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events for recovery runs and churn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Recovery
    /// Dump file loaded into memory
    DumpLoaded,
    /// Tag located in the buffer
    ScanAnchorFound,
    /// Window decoded and reported
    ScanRecovered,
    /// No window around a tag decoded
    ScanCandidateMalformed,
    /// Window decoded but the identifier was empty
    ScanEntityIncomplete,
    /// One kind scanned to the end of the buffer
    ScanKindComplete,
    /// Strict mode stopped a kind at its first failure
    ScanKindAborted,

    // Churn
    /// One chaos pass selected
    ChurnPass,
    /// One lifecycle action submitted
    ChurnAction,
    /// Nothing eligible for the selected action
    ChurnSkipped,
    /// Operation runner rejected or failed the action
    ChurnOperationFailed,

    // Store image
    /// Store image flushed to disk
    ImageWritten,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::DumpLoaded => "DUMP_LOADED",
            Event::ScanAnchorFound => "SCAN_ANCHOR_FOUND",
            Event::ScanRecovered => "SCAN_RECOVERED",
            Event::ScanCandidateMalformed => "SCAN_CANDIDATE_MALFORMED",
            Event::ScanEntityIncomplete => "SCAN_ENTITY_INCOMPLETE",
            Event::ScanKindComplete => "SCAN_KIND_COMPLETE",
            Event::ScanKindAborted => "SCAN_KIND_ABORTED",

            Event::ChurnPass => "CHURN_PASS",
            Event::ChurnAction => "CHURN_ACTION",
            Event::ChurnSkipped => "CHURN_SKIPPED",
            Event::ChurnOperationFailed => "CHURN_OPERATION_FAILED",

            Event::ImageWritten => "IMAGE_WRITTEN",
        }
    }

    /// Returns true if this event indicates a problem worth a WARN line
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::ScanCandidateMalformed
                | Event::ScanEntityIncomplete
                | Event::ScanKindAborted
                | Event::ChurnOperationFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
