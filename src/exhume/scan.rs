//! The scan loop
//!
//! Drives one extractor over a whole buffer:
//!
//! ```text
//! cursor ──► find key ──► start = tag - back_offset
//!                          │
//!                          ▼
//!            probe [start, start+min] .. [start, start+max]
//!                          │
//!              ┌───────────┴────────────┐
//!           decoded                  nothing decoded
//!              │                        │
//!          report()               MalformedCandidate
//!              │                        │
//!   cursor = window end     degraded: cursor = tag + key len
//!                           strict:   stop this kind
//! ```
//!
//! A missing key ends the kind. Windows past the end of the buffer are never
//! probed. A failed candidate only moves the cursor past its own tag, so a
//! damaged record cannot hide a valid one that starts inside its widest
//! window.

use serde::{Deserialize, Serialize};

use crate::entries::{CodecError, EntityKind};
use crate::observability::{log_event_with_fields, trace_event, Event};

use super::errors::{ReportError, ScanError};
use super::extractor::Extract;
use super::recovered::RecoveredStore;

/// What to do with a candidate that cannot be recovered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Record the failure and keep searching
    #[default]
    Degraded,
    /// Stop scanning the kind at its first failure
    Strict,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Degraded => "degraded",
            ScanMode::Strict => "strict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Malformed,
    Incomplete,
}

/// One candidate the scan could not recover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// Offset of the tag match
    pub offset: usize,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of scanning one kind
#[derive(Debug)]
pub struct KindReport {
    pub kind: EntityKind,
    pub anchors_found: usize,
    pub recovered: usize,
    /// Recoveries that replaced an earlier occurrence of the same identifier
    pub overwritten: usize,
    pub failures: Vec<CandidateFailure>,
    /// Set when strict mode stopped the kind early
    pub aborted: Option<ScanError>,
}

impl KindReport {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            anchors_found: 0,
            recovered: 0,
            overwritten: 0,
            failures: Vec::new(),
            aborted: None,
        }
    }

    pub fn malformed(&self) -> usize {
        self.count(FailureKind::Malformed)
    }

    pub fn incomplete(&self) -> usize {
        self.count(FailureKind::Incomplete)
    }

    /// Tag offsets of every failed candidate, in buffer order
    pub fn failed_offsets(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.offset).collect()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    fn count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

/// Scans `buf` for every record of the extractor's kind, reporting each
/// recovered entity into `store`.
pub fn exhume(
    buf: &[u8],
    extractor: &mut dyn Extract,
    store: &mut RecoveredStore,
    mode: ScanMode,
) -> KindReport {
    let kind = extractor.kind();
    let key = extractor.key();
    let back_offset = extractor.back_offset();
    let bounds = extractor.bounds();
    let kind_name = kind.as_str();

    let mut report = KindReport::new(kind);
    let mut cursor = 0;

    while cursor < buf.len() {
        extractor.reset();

        let tag_at = match find(&buf[cursor..], key) {
            Some(rel) => cursor + rel,
            None => break,
        };
        report.anchors_found += 1;
        let offset = tag_at.to_string();
        trace_event(
            Event::ScanAnchorFound,
            &[("kind", kind_name), ("offset", &offset)],
        );

        let probed = match tag_at.checked_sub(back_offset) {
            Some(start) => probe(buf, start, bounds.min, bounds.max, extractor),
            None => Err(format!(
                "tag at offset {} leaves no room for a {}-byte header",
                tag_at, back_offset
            )),
        };

        let failure = match probed {
            Ok(window_end) => {
                cursor = window_end;
                match extractor.report(store) {
                    Ok(reported) => {
                        report.recovered += 1;
                        if reported.replaced {
                            report.overwritten += 1;
                        }
                        let len = (window_end - (tag_at - back_offset)).to_string();
                        log_event_with_fields(
                            Event::ScanRecovered,
                            &[
                                ("id", &reported.id),
                                ("kind", kind_name),
                                ("len", &len),
                                ("offset", &offset),
                            ],
                        );
                        continue;
                    }
                    Err(reason) => incomplete(kind, tag_at, reason),
                }
            }
            Err(reason) => {
                cursor = tag_at + key.len();
                malformed(kind, tag_at, reason)
            }
        };

        report.failures.push(failure.clone());
        if mode == ScanMode::Strict {
            report.aborted = Some(failure.into_error(kind));
            break;
        }
    }

    let (anchors, recovered, failed) = (
        report.anchors_found.to_string(),
        report.recovered.to_string(),
        report.failures.len().to_string(),
    );
    let fields = [
        ("anchors", anchors.as_str()),
        ("failed", failed.as_str()),
        ("kind", kind_name),
        ("recovered", recovered.as_str()),
    ];
    if let Some(err) = &report.aborted {
        let code = err.code();
        let mut with_code = fields.to_vec();
        with_code.push(("code", code));
        log_event_with_fields(Event::ScanKindAborted, &with_code);
    } else {
        log_event_with_fields(Event::ScanKindComplete, &fields);
    }

    report
}

/// Probes every window from `start + min` to `start + max` that fits in the
/// buffer. Returns the end of the first window that decodes.
fn probe(
    buf: &[u8],
    start: usize,
    min: usize,
    max: usize,
    extractor: &mut dyn Extract,
) -> Result<usize, String> {
    let last = start.saturating_add(max).min(buf.len());
    let first = start.saturating_add(min);
    if first > last {
        return Err(format!(
            "only {} bytes after record start, window needs at least {}",
            buf.len() - start,
            min
        ));
    }

    let mut declared_len: Option<usize> = None;
    let mut structural: Option<CodecError> = None;
    for end in first..=last {
        match extractor.unmarshal(&buf[start..end]) {
            Ok(()) => return Ok(end),
            Err(CodecError::LengthMismatch { declared, .. }) => {
                declared_len.get_or_insert(declared);
            }
            Err(e) => {
                structural.get_or_insert(e);
            }
        }
    }

    if let Some(e) = structural {
        return Err(e.to_string());
    }
    // Every window disagreed with the header: compare it to the widest one
    match declared_len {
        Some(declared) => Err(format!(
            "record length mismatch: header declares {}, at most {} bytes available (window limit {})",
            declared,
            last - start,
            max
        )),
        None => Err("no window decoded".to_string()),
    }
}

fn malformed(kind: EntityKind, offset: usize, reason: String) -> CandidateFailure {
    let at = offset.to_string();
    log_event_with_fields(
        Event::ScanCandidateMalformed,
        &[("kind", kind.as_str()), ("offset", &at), ("reason", &reason)],
    );
    CandidateFailure {
        offset,
        kind: FailureKind::Malformed,
        reason,
    }
}

fn incomplete(kind: EntityKind, offset: usize, reason: ReportError) -> CandidateFailure {
    let at = offset.to_string();
    let text = reason.to_string();
    log_event_with_fields(
        Event::ScanEntityIncomplete,
        &[("kind", kind.as_str()), ("offset", &at), ("reason", &text)],
    );
    CandidateFailure {
        offset,
        kind: FailureKind::Incomplete,
        reason: text,
    }
}

impl CandidateFailure {
    fn into_error(self, kind: EntityKind) -> ScanError {
        match self.kind {
            FailureKind::Malformed => ScanError::MalformedCandidate {
                kind,
                offset: self.offset,
                reason: self.reason,
            },
            // The only report failure a decoded entity can hit
            FailureKind::Incomplete => ScanError::IncompleteEntity {
                kind,
                offset: self.offset,
                reason: ReportError::EmptyIdentifier,
            },
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{BlockVolumeEntry, Entry, VolumeEntry};
    use crate::exhume::extractor::{extractor_for, BASE_MAX_WINDOW};

    fn volume(id: &str, name: &str) -> VolumeEntry {
        VolumeEntry {
            id: id.into(),
            name: name.into(),
            size: 10,
            ..VolumeEntry::default()
        }
    }

    fn scan(buf: &[u8], kind: EntityKind, mode: ScanMode) -> (RecoveredStore, KindReport) {
        let mut store = RecoveredStore::new();
        let mut extractor = extractor_for(kind);
        let report = exhume(buf, extractor.as_mut(), &mut store, mode);
        (store, report)
    }

    /// Block volume whose record is exactly `len` bytes
    fn block_volume_of_len(id: &str, len: usize) -> Vec<u8> {
        let base = BlockVolumeEntry {
            id: id.into(),
            ..BlockVolumeEntry::default()
        }
        .marshal()
        .len();
        let record = BlockVolumeEntry {
            id: id.into(),
            name: "x".repeat(len - base),
            ..BlockVolumeEntry::default()
        }
        .marshal();
        assert_eq!(record.len(), len);
        record
    }

    #[test]
    fn test_record_behind_noise_recovered() {
        let mut buf = vec![0xAAu8; 6];
        buf.extend(volume("abc123", "vol_abc123").marshal());
        buf.resize(4096, 0);

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        assert!(store.volumes.contains_key("abc123"));
        assert_eq!(report.recovered, 1);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_no_tags_is_not_an_error() {
        let buf = vec![0x5Au8; 4096];
        for kind in EntityKind::SCAN_ORDER {
            let (store, report) = scan(&buf, kind, ScanMode::Strict);
            assert!(store.is_empty());
            assert_eq!(report.anchors_found, 0);
            assert!(!report.is_aborted());
        }
    }

    #[test]
    fn test_empty_buffer() {
        let (store, report) = scan(&[], EntityKind::Volume, ScanMode::Degraded);
        assert!(store.is_empty());
        assert_eq!(report.anchors_found, 0);
    }

    #[test]
    fn test_max_window_is_inclusive() {
        let mut buf = block_volume_of_len("at-max", BASE_MAX_WINDOW);
        buf.extend_from_slice(&[0u8; 16]);

        let (store, report) = scan(&buf, EntityKind::BlockVolume, ScanMode::Degraded);
        assert!(store.block_volumes.contains_key("at-max"));
        assert_eq!(report.recovered, 1);
    }

    #[test]
    fn test_one_past_max_window_is_malformed_and_scan_continues() {
        let mut buf = block_volume_of_len("too-big", BASE_MAX_WINDOW + 1);
        let fits = BlockVolumeEntry {
            id: "fits".into(),
            ..BlockVolumeEntry::default()
        };
        buf.extend(fits.marshal());

        let (store, report) = scan(&buf, EntityKind::BlockVolume, ScanMode::Degraded);
        assert!(!store.block_volumes.contains_key("too-big"));
        assert!(store.block_volumes.contains_key("fits"));
        assert_eq!(report.malformed(), 1);
        assert_eq!(report.failed_offsets(), vec![7]);
        assert!(!report.is_aborted());

        let reason = &report.failures[0].reason;
        assert!(reason.contains("declares 4097"), "{}", reason);
        assert!(reason.contains("at most 4096 bytes available"), "{}", reason);
    }

    #[test]
    fn test_degraded_recovers_valid_record_after_corrupt_one() {
        let mut corrupt = volume("broken", "vol_broken").marshal();
        let mid = corrupt.len() / 2;
        corrupt[mid] ^= 0xFF;

        let mut buf = corrupt;
        buf.extend(volume("good", "vol_good").marshal());

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        assert!(store.volumes.contains_key("good"));
        assert!(!store.volumes.contains_key("broken"));
        assert_eq!(report.anchors_found, 2);
        assert_eq!(report.malformed(), 1);
        assert!(report.failures[0].reason.contains("checksum"));
    }

    #[test]
    fn test_strict_stops_at_first_failure() {
        let mut corrupt = volume("broken", "vol_broken").marshal();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;

        let mut buf = corrupt;
        buf.extend(volume("good", "vol_good").marshal());

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Strict);
        assert!(store.is_empty());
        assert!(matches!(
            report.aborted,
            Some(ScanError::MalformedCandidate { offset: 6, .. })
        ));
    }

    #[test]
    fn test_empty_identifier_is_incomplete() {
        let mut buf = volume("", "nameless").marshal();
        buf.extend(volume("v2", "named").marshal());

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        assert_eq!(report.incomplete(), 1);
        assert!(store.volumes.contains_key("v2"));
        assert_eq!(store.count(EntityKind::Volume), 1);

        let (_, strict) = scan(&buf, EntityKind::Volume, ScanMode::Strict);
        assert!(matches!(
            strict.aborted,
            Some(ScanError::IncompleteEntity {
                reason: ReportError::EmptyIdentifier,
                ..
            })
        ));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let mut buf = volume("dup", "first").marshal();
        buf.extend(volume("dup", "second").marshal());

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        assert_eq!(store.volumes["dup"].name, "second");
        assert_eq!(report.recovered, 2);
        assert_eq!(report.overwritten, 1);
    }

    #[test]
    fn test_tag_too_close_to_start() {
        let record = volume("v1", "vol_v1").marshal();
        // Drop the first three header bytes so the tag sits at offset 3.
        let buf = record[3..].to_vec();

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        assert!(store.is_empty());
        assert_eq!(report.malformed(), 1);
        assert_eq!(report.failed_offsets(), vec![3]);
    }

    #[test]
    fn test_truncated_tail_is_malformed() {
        let mut buf = volume("v1", "vol_v1").marshal();
        let record = volume("v2", "vol_v2").marshal();
        buf.extend_from_slice(&record[..record.len() - 10]);

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        assert!(store.volumes.contains_key("v1"));
        assert!(!store.volumes.contains_key("v2"));
        assert_eq!(report.malformed(), 1);

        let reason = &report.failures[0].reason;
        let declared = format!("declares {}", record.len());
        let available = format!("at most {} bytes available", record.len() - 10);
        assert!(reason.contains(&declared), "{}", reason);
        assert!(reason.contains(&available), "{}", reason);
    }

    #[test]
    fn test_volume_scan_ignores_block_volumes() {
        let buf = BlockVolumeEntry {
            id: "bv1".into(),
            ..BlockVolumeEntry::default()
        }
        .marshal();

        let (store, report) = scan(&buf, EntityKind::Volume, ScanMode::Strict);
        assert!(store.is_empty());
        assert_eq!(report.anchors_found, 0);
    }

    #[test]
    fn test_scanning_twice_is_idempotent() {
        let mut buf = vec![1u8, 2, 3];
        buf.extend(volume("a", "vol_a").marshal());
        buf.extend_from_slice(&[9u8; 40]);
        buf.extend(volume("b", "vol_b").marshal());

        let (first, _) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        let (second, _) = scan(&buf, EntityKind::Volume, ScanMode::Degraded);
        assert_eq!(first, second);
        assert_eq!(first.count(EntityKind::Volume), 2);
    }

    #[test]
    fn test_scan_mode_serde_names() {
        let mode: ScanMode = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(mode, ScanMode::Strict);
        assert_eq!(serde_json::to_string(&ScanMode::Degraded).unwrap(), "\"degraded\"");
        assert_eq!(ScanMode::default(), ScanMode::Degraded);
        assert!(serde_json::from_str::<ScanMode>("\"lenient\"").is_err());
    }
}
