//! Recovery scan scenarios
//!
//! Dumps are assembled by hand from marshaled records, padding and damage,
//! then scanned the way the CLI scans them.

use exhume::entries::{
    BlockVolumeEntry, BrickEntry, ChangeType, ClusterEntry, DbAttributeEntry, DeviceEntry,
    EntityKind, Entry, NodeEntry, PendingOperationEntry, PendingOperationType, VolumeEntry,
    DB_CLUSTER_HAS_FILE_BLOCK_FLAG,
};
use exhume::exhume::{
    exhume as scan_one_kind, extractor_for, recover, recover_file, RecoveredStore,
    RecoveryOptions, ScanError, ScanMode, BASE_MAX_WINDOW,
};
use std::fs;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn volume(id: &str) -> VolumeEntry {
    VolumeEntry {
        id: id.into(),
        name: format!("vol_{}", id),
        cluster_id: "c1".into(),
        size: 10,
        bricks: vec![format!("{}-b0", id), format!("{}-b1", id)],
        ..VolumeEntry::default()
    }
}

fn block_volume(id: &str, name_len: usize) -> BlockVolumeEntry {
    BlockVolumeEntry {
        id: id.into(),
        name: "n".repeat(name_len),
        hosting_volume: "v1".into(),
        ..BlockVolumeEntry::default()
    }
}

/// Block volume padded so its record is exactly `len` bytes
fn block_volume_record(id: &str, len: usize) -> Vec<u8> {
    let base = block_volume(id, 0).marshal().len();
    let record = block_volume(id, len - base).marshal();
    assert_eq!(record.len(), len);
    record
}

/// Cluster padded through one node id so its record is exactly `len` bytes
fn cluster_record(id: &str, len: usize) -> Vec<u8> {
    let padded = |pad: usize| ClusterEntry {
        nodes: vec!["n".repeat(pad)],
        ..ClusterEntry::new(id)
    };
    let base = padded(0).marshal().len();
    let record = padded(len - base).marshal();
    assert_eq!(record.len(), len);
    record
}

/// Pending operation padded through one change id so its record is exactly `len` bytes
fn pending_record(id: &str, len: usize) -> Vec<u8> {
    let padded = |pad: usize| {
        let mut pending =
            PendingOperationEntry::new(id, PendingOperationType::CreateVolume, 1_700_000_000);
        pending.record_change(ChangeType::AddVolume, "p".repeat(pad));
        pending
    };
    let base = padded(0).marshal().len();
    let record = padded(len - base).marshal();
    assert_eq!(record.len(), len);
    record
}

fn scan_kind(buf: &[u8], kind: EntityKind, mode: ScanMode) -> RecoveredStore {
    let mut store = RecoveredStore::new();
    let mut extractor = extractor_for(kind);
    scan_one_kind(buf, extractor.as_mut(), &mut store, mode);
    store
}

// =============================================================================
// Scenarios
// =============================================================================

/// A volume behind six noise bytes inside a 4096-byte buffer.
#[test]
fn test_volume_inside_page() {
    let mut buf = vec![0x13u8; 6];
    buf.extend(volume("abc123").marshal());
    buf.resize(4096, 0x13);

    let run = recover(&buf, &RecoveryOptions::default());
    assert!(run.store.volumes.contains_key("abc123"));
    assert_eq!(run.store.volumes["abc123"], volume("abc123"));
    assert_eq!(run.failure_count(), 0);
}

/// No tags anywhere: nothing recovered, nothing failed.
#[test]
fn test_buffer_without_tags() {
    let buf: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
    let run = recover(&buf, &RecoveryOptions::strict());
    assert!(run.store.is_empty());
    assert_eq!(run.aborted().count(), 0);
    assert!(run.reports.iter().all(|r| r.anchors_found == 0));
}

/// Block volume one byte past its largest window fails; the scan goes on.
#[test]
fn test_oversized_block_volume() {
    let mut buf = block_volume_record("huge", BASE_MAX_WINDOW + 1);
    buf.extend(block_volume("small", 4).marshal());

    let run = recover(&buf, &RecoveryOptions::default());
    let report = run.report(EntityKind::BlockVolume).unwrap();
    assert_eq!(report.malformed(), 1);
    assert!(!run.store.block_volumes.contains_key("huge"));
    assert!(run.store.block_volumes.contains_key("small"));
}

#[test]
fn test_block_volume_at_max_window() {
    let buf = block_volume_record("exact", BASE_MAX_WINDOW);
    let store = scan_kind(&buf, EntityKind::BlockVolume, ScanMode::Strict);
    assert!(store.block_volumes.contains_key("exact"));
}

#[test]
fn test_cluster_window_is_four_pages() {
    let limit = 4 * BASE_MAX_WINDOW;
    assert_eq!(limit, 16384);

    let buf = cluster_record("exact", limit);
    let store = scan_kind(&buf, EntityKind::Cluster, ScanMode::Strict);
    assert!(store.clusters.contains_key("exact"));

    let mut buf = cluster_record("huge", limit + 1);
    buf.extend(ClusterEntry::new("small").marshal());
    let run = recover(&buf, &RecoveryOptions::default());
    let report = run.report(EntityKind::Cluster).unwrap();
    assert_eq!(report.malformed(), 1);
    assert!(!run.store.clusters.contains_key("huge"));
    assert!(run.store.clusters.contains_key("small"));
}

#[test]
fn test_pending_operation_window_is_eight_pages() {
    let limit = 8 * BASE_MAX_WINDOW;
    assert_eq!(limit, 32768);

    let buf = pending_record("exact", limit);
    let store = scan_kind(&buf, EntityKind::PendingOperation, ScanMode::Strict);
    assert!(store.pending_operations.contains_key("exact"));

    let small = PendingOperationEntry::new("small", PendingOperationType::DeleteVolume, 7);
    let mut buf = pending_record("huge", limit + 1);
    buf.extend(small.marshal());
    let run = recover(&buf, &RecoveryOptions::default());
    let report = run.report(EntityKind::PendingOperation).unwrap();
    assert_eq!(report.malformed(), 1);
    assert!(!run.store.pending_operations.contains_key("huge"));
    assert_eq!(run.store.pending_operations["small"], small);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_any_offset_recovers() {
    let record = volume("v-offset").marshal();
    for offset in [0usize, 1, 6, 7, 63, 511, 4095] {
        let mut buf = vec![0xEEu8; offset];
        buf.extend_from_slice(&record);
        buf.extend_from_slice(&[0xEEu8; 17]);

        let store = scan_kind(&buf, EntityKind::Volume, ScanMode::Strict);
        assert!(store.volumes.contains_key("v-offset"), "offset {}", offset);
    }
}

#[test]
fn test_every_kind_recovers_from_one_dump() {
    let mut pending =
        PendingOperationEntry::new("p1", PendingOperationType::CreateVolume, 1_700_000_000);
    pending.record_change(ChangeType::AddVolume, "v1");
    pending.record_change(ChangeType::AddBrick, "b1");

    let records: Vec<Vec<u8>> = vec![
        ClusterEntry::new("c1").marshal(),
        NodeEntry {
            id: "n1".into(),
            cluster_id: "c1".into(),
            devices: vec!["d1".into()],
            ..NodeEntry::default()
        }
        .marshal(),
        DeviceEntry {
            id: "d1".into(),
            node_id: "n1".into(),
            total_size: 100,
            free_size: 100,
            ..DeviceEntry::default()
        }
        .marshal(),
        BrickEntry {
            id: "b1".into(),
            volume_id: "v1".into(),
            ..BrickEntry::default()
        }
        .marshal(),
        volume("v1").marshal(),
        block_volume("bv1", 8).marshal(),
        pending.marshal(),
        DbAttributeEntry::new(DB_CLUSTER_HAS_FILE_BLOCK_FLAG, "yes").marshal(),
    ];

    let mut buf = Vec::new();
    for (i, record) in records.iter().enumerate() {
        buf.extend(std::iter::repeat(0xC3u8).take(i * 3 + 1));
        buf.extend_from_slice(record);
    }

    let run = recover(&buf, &RecoveryOptions::strict());
    assert_eq!(run.aborted().count(), 0);
    for kind in EntityKind::SCAN_ORDER {
        assert_eq!(run.store.count(kind), 1, "{}", kind);
    }
    assert_eq!(run.store.pending_operations["p1"], pending);
    assert_eq!(
        run.store.db_attributes[DB_CLUSTER_HAS_FILE_BLOCK_FLAG].value,
        "yes"
    );
}

#[test]
fn test_later_duplicate_wins() {
    let mut first = volume("dup");
    first.size = 1;
    let mut second = volume("dup");
    second.size = 2;

    let mut buf = first.marshal();
    buf.extend(second.marshal());

    let run = recover(&buf, &RecoveryOptions::default());
    assert_eq!(run.store.volumes["dup"].size, 2);
    assert_eq!(run.report(EntityKind::Volume).unwrap().overwritten, 1);
}

#[test]
fn test_degraded_skips_corrupt_record() {
    let mut corrupt = volume("bad").marshal();
    corrupt[30] ^= 0x01;
    let mut buf = corrupt;
    buf.extend(volume("good").marshal());

    let degraded = recover(&buf, &RecoveryOptions::default());
    assert!(degraded.store.volumes.contains_key("good"));
    assert!(!degraded.store.volumes.contains_key("bad"));

    let strict = recover(&buf, &RecoveryOptions::strict());
    assert!(strict.store.volumes.is_empty());
    let aborted: Vec<&ScanError> = strict.aborted().collect();
    assert_eq!(aborted.len(), 1);
    assert_eq!(aborted[0].code(), "EXHUME_MALFORMED_CANDIDATE");
}

#[test]
fn test_scanning_twice_gives_identical_snapshot() {
    let mut buf = vec![0u8; 100];
    buf.extend(volume("a").marshal());
    buf.extend(block_volume("b", 12).marshal());
    buf.extend(volume("c").marshal());
    buf.extend(vec![0u8; 100]);

    let first = recover(&buf, &RecoveryOptions::default());
    let second = recover(&buf, &RecoveryOptions::default());
    assert_eq!(first.store, second.store);
    assert_eq!(
        first.store.to_json().unwrap(),
        second.store.to_json().unwrap()
    );
}

// =============================================================================
// Files
// =============================================================================

#[test]
fn test_recover_file_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");
    let mut buf = vec![0xFFu8; 4096];
    buf.extend(volume("on-disk").marshal());
    fs::write(&path, &buf).unwrap();

    let run = recover_file(&path, &RecoveryOptions::default()).unwrap();
    assert!(run.store.volumes.contains_key("on-disk"));
}

#[test]
fn test_unreadable_dump_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = recover_file(&dir.path().join("absent.db"), &RecoveryOptions::default()).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code(), "EXHUME_IO_ERROR");
}
