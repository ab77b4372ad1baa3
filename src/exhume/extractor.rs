//! Per-kind extractors
//!
//! An extractor knows three things about its kind: the tag bytes that sit
//! next to every record (the scan anchor), how far before the tag the record
//! starts, and how large a record can be. It also holds the entity decoded
//! by the last successful probe until the scan loop asks it to report.
//!
//! Anchor table (type name starts 7 bytes into a record, its length byte at
//! offset 6):
//!
//! | Kind              | Key                        | Back | Max window |
//! |-------------------|----------------------------|------|------------|
//! | volume            | `\x0bVolumeEntry`          | 6    | 4096       |
//! | block volume      | `BlockVolumeEntry`         | 7    | 4096       |
//! | brick             | `BrickEntry`               | 7    | 4096       |
//! | node              | `NodeEntry`                | 7    | 4096       |
//! | device            | `DeviceEntry`              | 7    | 4096 x 4   |
//! | cluster           | `ClusterEntry`             | 7    | 4096 x 4   |
//! | pending operation | `PendingOperationEntry`    | 7    | 4096 x 8   |
//! | db attribute      | `DbAttributeEntry`         | 7    | 4096       |
//!
//! `VolumeEntry` is a suffix of `BlockVolumeEntry`, so the volume key
//! includes the length byte (0x0b) to keep volume scans out of block-volume
//! records. Devices and clusters carry reference lists that grow with the
//! cluster; pending operations carry a change list per touched entity.

use crate::entries::{
    codec, BlockVolumeEntry, BrickEntry, ClusterEntry, CodecResult, DbAttributeEntry,
    DeviceEntry, EntityKind, Entry, NodeEntry, PendingOperationEntry, VolumeEntry,
};

use super::errors::ReportError;
use super::recovered::{RecoveredEntity, RecoveredStore};

/// Largest window probed for kinds with fixed-size payloads
pub const BASE_MAX_WINDOW: usize = 4096;

/// Smallest window probed for any kind; below every kind's empty record
pub const MIN_WINDOW: usize = 32;

/// Inclusive range of candidate record lengths to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub min: usize,
    pub max: usize,
}

impl WindowBounds {
    pub const fn scaled(multiplier: usize) -> Self {
        Self {
            min: MIN_WINDOW,
            max: BASE_MAX_WINDOW * multiplier,
        }
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// Scan anchor for one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub key: &'static [u8],
    pub back_offset: usize,
    pub bounds: WindowBounds,
}

/// Anchor constants for a kind.
pub fn anchor(kind: EntityKind) -> Anchor {
    let tagged = |key: &'static [u8], multiplier: usize| Anchor {
        key,
        back_offset: codec::TYPE_NAME_OFFSET,
        bounds: WindowBounds::scaled(multiplier),
    };
    match kind {
        EntityKind::Volume => Anchor {
            key: b"\x0bVolumeEntry",
            back_offset: codec::TYPE_NAME_LEN_OFFSET,
            bounds: WindowBounds::scaled(1),
        },
        EntityKind::BlockVolume => tagged(b"BlockVolumeEntry", 1),
        EntityKind::Brick => tagged(b"BrickEntry", 1),
        EntityKind::Node => tagged(b"NodeEntry", 1),
        EntityKind::Device => tagged(b"DeviceEntry", 4),
        EntityKind::Cluster => tagged(b"ClusterEntry", 4),
        EntityKind::PendingOperation => tagged(b"PendingOperationEntry", 8),
        EntityKind::DbAttribute => tagged(b"DbAttributeEntry", 1),
    }
}

/// What a successful report did to the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reported {
    pub id: String,
    /// An entity with the same identifier was already recovered
    pub replaced: bool,
}

/// Contract the scan loop drives for one entity kind
pub trait Extract {
    fn kind(&self) -> EntityKind;

    /// Clears scratch state; called before every anchor search.
    fn reset(&mut self);

    /// Tag bytes adjacent to every record of this kind.
    fn key(&self) -> &'static [u8];

    /// Bytes from the record start to the key.
    fn back_offset(&self) -> usize;

    /// Candidate record lengths to probe.
    fn bounds(&self) -> WindowBounds;

    /// Attempts to decode exactly `window`, holding the entity on success.
    fn unmarshal(&mut self, window: &[u8]) -> CodecResult<()>;

    /// Moves the held entity into `store` if its identifier is non-empty.
    fn report(&mut self, store: &mut RecoveredStore) -> Result<Reported, ReportError>;
}

/// Extractor for any entry type; one instantiation per kind.
#[derive(Debug)]
pub struct EntryExtractor<E> {
    held: Option<E>,
}

impl<E> EntryExtractor<E> {
    pub fn new() -> Self {
        Self { held: None }
    }
}

impl<E> Default for EntryExtractor<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Extract for EntryExtractor<E>
where
    E: Entry + Into<RecoveredEntity>,
{
    fn kind(&self) -> EntityKind {
        E::KIND
    }

    fn reset(&mut self) {
        self.held = None;
    }

    fn key(&self) -> &'static [u8] {
        anchor(E::KIND).key
    }

    fn back_offset(&self) -> usize {
        anchor(E::KIND).back_offset
    }

    fn bounds(&self) -> WindowBounds {
        anchor(E::KIND).bounds
    }

    fn unmarshal(&mut self, window: &[u8]) -> CodecResult<()> {
        match E::unmarshal(window) {
            Ok(entry) => {
                self.held = Some(entry);
                Ok(())
            }
            Err(e) => {
                self.held = None;
                Err(e)
            }
        }
    }

    fn report(&mut self, store: &mut RecoveredStore) -> Result<Reported, ReportError> {
        let entry = self.held.take().ok_or(ReportError::NothingHeld)?;
        if entry.id().is_empty() {
            return Err(ReportError::EmptyIdentifier);
        }
        let id = entry.id().to_string();
        let replaced = store.insert(entry.into());
        Ok(Reported { id, replaced })
    }
}

/// The extractor for one kind, from the closed set.
pub fn extractor_for(kind: EntityKind) -> Box<dyn Extract> {
    match kind {
        EntityKind::Cluster => Box::new(EntryExtractor::<ClusterEntry>::new()),
        EntityKind::Node => Box::new(EntryExtractor::<NodeEntry>::new()),
        EntityKind::Device => Box::new(EntryExtractor::<DeviceEntry>::new()),
        EntityKind::Brick => Box::new(EntryExtractor::<BrickEntry>::new()),
        EntityKind::Volume => Box::new(EntryExtractor::<VolumeEntry>::new()),
        EntityKind::BlockVolume => Box::new(EntryExtractor::<BlockVolumeEntry>::new()),
        EntityKind::PendingOperation => Box::new(EntryExtractor::<PendingOperationEntry>::new()),
        EntityKind::DbAttribute => Box::new(EntryExtractor::<DbAttributeEntry>::new()),
    }
}
