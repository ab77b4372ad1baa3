//! One recovery run over one dump
//!
//! Every requested kind is scanned over the same buffer, in scan order,
//! into one accumulator. A kind that fails (or aborts in strict mode) never
//! stops the kinds after it; only failing to read the dump ends a run.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entries::EntityKind;
use crate::observability::{log_event_with_fields, Event, ObservationScope};

use super::errors::{ScanError, ScanResult};
use super::extractor::extractor_for;
use super::recovered::RecoveredStore;
use super::scan::{exhume, KindReport, ScanMode};

/// Knobs for one recovery run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryOptions {
    #[serde(default)]
    pub mode: ScanMode,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<EntityKind>,
}

fn default_kinds() -> Vec<EntityKind> {
    EntityKind::SCAN_ORDER.to_vec()
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::default(),
            kinds: default_kinds(),
        }
    }
}

impl RecoveryOptions {
    pub fn strict() -> Self {
        Self {
            mode: ScanMode::Strict,
            ..Self::default()
        }
    }

    /// Requested kinds, deduplicated and put in scan order.
    pub fn ordered_kinds(&self) -> Vec<EntityKind> {
        EntityKind::SCAN_ORDER
            .iter()
            .copied()
            .filter(|k| self.kinds.contains(k))
            .collect()
    }
}

/// Snapshot plus per-kind outcome of one run
#[derive(Debug)]
pub struct RecoveryRun {
    pub store: RecoveredStore,
    pub reports: Vec<KindReport>,
}

impl RecoveryRun {
    pub fn report(&self, kind: EntityKind) -> Option<&KindReport> {
        self.reports.iter().find(|r| r.kind == kind)
    }

    /// Strict-mode aborts, in scan order
    pub fn aborted(&self) -> impl Iterator<Item = &ScanError> {
        self.reports.iter().filter_map(|r| r.aborted.as_ref())
    }

    pub fn failure_count(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }
}

/// Scans `buf` once per requested kind.
pub fn recover(buf: &[u8], options: &RecoveryOptions) -> RecoveryRun {
    let bytes = buf.len().to_string();
    let scope = ObservationScope::with_fields(
        "EXHUME",
        &[("bytes", &bytes), ("mode", options.mode.as_str())],
    );

    let mut store = RecoveredStore::new();
    let reports: Vec<KindReport> = options
        .ordered_kinds()
        .into_iter()
        .map(|kind| {
            let mut extractor = extractor_for(kind);
            exhume(buf, extractor.as_mut(), &mut store, options.mode)
        })
        .collect();

    let recovered = store.len().to_string();
    let failed = reports
        .iter()
        .map(|r| r.failures.len())
        .sum::<usize>()
        .to_string();
    scope.complete_with_fields(&[("failed", &failed), ("recovered", &recovered)]);

    RecoveryRun { store, reports }
}

/// Reads the dump at `path` and recovers it.
pub fn recover_file(path: &Path, options: &RecoveryOptions) -> ScanResult<RecoveryRun> {
    let buf = fs::read(path).map_err(|e| ScanError::io(path, e))?;
    let bytes = buf.len().to_string();
    let shown = path.display().to_string();
    log_event_with_fields(Event::DumpLoaded, &[("bytes", &bytes), ("path", &shown)]);
    Ok(recover(&buf, options))
}
