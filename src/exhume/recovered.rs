//! Recovered-store accumulator
//!
//! One map per entity kind, identifier -> entity, filled only through
//! extractor reports. Later inserts overwrite earlier ones, so the last
//! occurrence of an identifier in the dump wins. Maps are ordered so the
//! serialized snapshot is stable and diffable against a known-good store.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::entries::{
    BlockVolumeEntry, BrickEntry, ClusterEntry, DbAttributeEntry, DeviceEntry, EntityKind, Entry,
    NodeEntry, PendingOperationEntry, VolumeEntry,
};

/// One entity recovered from a dump, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveredEntity {
    Cluster(ClusterEntry),
    Node(NodeEntry),
    Device(DeviceEntry),
    Brick(BrickEntry),
    Volume(VolumeEntry),
    BlockVolume(BlockVolumeEntry),
    PendingOperation(PendingOperationEntry),
    DbAttribute(DbAttributeEntry),
}

impl RecoveredEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecoveredEntity::Cluster(_) => EntityKind::Cluster,
            RecoveredEntity::Node(_) => EntityKind::Node,
            RecoveredEntity::Device(_) => EntityKind::Device,
            RecoveredEntity::Brick(_) => EntityKind::Brick,
            RecoveredEntity::Volume(_) => EntityKind::Volume,
            RecoveredEntity::BlockVolume(_) => EntityKind::BlockVolume,
            RecoveredEntity::PendingOperation(_) => EntityKind::PendingOperation,
            RecoveredEntity::DbAttribute(_) => EntityKind::DbAttribute,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecoveredEntity::Cluster(e) => e.id(),
            RecoveredEntity::Node(e) => e.id(),
            RecoveredEntity::Device(e) => e.id(),
            RecoveredEntity::Brick(e) => e.id(),
            RecoveredEntity::Volume(e) => e.id(),
            RecoveredEntity::BlockVolume(e) => e.id(),
            RecoveredEntity::PendingOperation(e) => e.id(),
            RecoveredEntity::DbAttribute(e) => e.id(),
        }
    }

    /// Record bytes as the live store would have written them.
    pub fn marshal(&self) -> Vec<u8> {
        match self {
            RecoveredEntity::Cluster(e) => e.marshal(),
            RecoveredEntity::Node(e) => e.marshal(),
            RecoveredEntity::Device(e) => e.marshal(),
            RecoveredEntity::Brick(e) => e.marshal(),
            RecoveredEntity::Volume(e) => e.marshal(),
            RecoveredEntity::BlockVolume(e) => e.marshal(),
            RecoveredEntity::PendingOperation(e) => e.marshal(),
            RecoveredEntity::DbAttribute(e) => e.marshal(),
        }
    }
}

macro_rules! recovered_from {
    ($($variant:ident => $entry:ty),* $(,)?) => {
        $(
            impl From<$entry> for RecoveredEntity {
                fn from(entry: $entry) -> Self {
                    RecoveredEntity::$variant(entry)
                }
            }
        )*
    };
}

recovered_from! {
    Cluster => ClusterEntry,
    Node => NodeEntry,
    Device => DeviceEntry,
    Brick => BrickEntry,
    Volume => VolumeEntry,
    BlockVolume => BlockVolumeEntry,
    PendingOperation => PendingOperationEntry,
    DbAttribute => DbAttributeEntry,
}

/// Everything one recovery run scraped out of a dump
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredStore {
    #[serde(rename = "clusterentries")]
    pub clusters: BTreeMap<String, ClusterEntry>,
    #[serde(rename = "nodeentries")]
    pub nodes: BTreeMap<String, NodeEntry>,
    #[serde(rename = "deviceentries")]
    pub devices: BTreeMap<String, DeviceEntry>,
    #[serde(rename = "brickentries")]
    pub bricks: BTreeMap<String, BrickEntry>,
    #[serde(rename = "volumeentries")]
    pub volumes: BTreeMap<String, VolumeEntry>,
    #[serde(rename = "blockvolumeentries")]
    pub block_volumes: BTreeMap<String, BlockVolumeEntry>,
    #[serde(rename = "pendingoperations")]
    pub pending_operations: BTreeMap<String, PendingOperationEntry>,
    #[serde(rename = "dbattributeentries")]
    pub db_attributes: BTreeMap<String, DbAttributeEntry>,
}

impl RecoveredStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts under (kind, identifier). Returns true if it replaced an
    /// earlier occurrence.
    pub fn insert(&mut self, entity: RecoveredEntity) -> bool {
        let id = entity.id().to_string();
        match entity {
            RecoveredEntity::Cluster(e) => self.clusters.insert(id, e).is_some(),
            RecoveredEntity::Node(e) => self.nodes.insert(id, e).is_some(),
            RecoveredEntity::Device(e) => self.devices.insert(id, e).is_some(),
            RecoveredEntity::Brick(e) => self.bricks.insert(id, e).is_some(),
            RecoveredEntity::Volume(e) => self.volumes.insert(id, e).is_some(),
            RecoveredEntity::BlockVolume(e) => self.block_volumes.insert(id, e).is_some(),
            RecoveredEntity::PendingOperation(e) => {
                self.pending_operations.insert(id, e).is_some()
            }
            RecoveredEntity::DbAttribute(e) => self.db_attributes.insert(id, e).is_some(),
        }
    }

    /// Number of recovered entities of one kind
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Cluster => self.clusters.len(),
            EntityKind::Node => self.nodes.len(),
            EntityKind::Device => self.devices.len(),
            EntityKind::Brick => self.bricks.len(),
            EntityKind::Volume => self.volumes.len(),
            EntityKind::BlockVolume => self.block_volumes.len(),
            EntityKind::PendingOperation => self.pending_operations.len(),
            EntityKind::DbAttribute => self.db_attributes.len(),
        }
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Cluster => self.clusters.contains_key(id),
            EntityKind::Node => self.nodes.contains_key(id),
            EntityKind::Device => self.devices.contains_key(id),
            EntityKind::Brick => self.bricks.contains_key(id),
            EntityKind::Volume => self.volumes.contains_key(id),
            EntityKind::BlockVolume => self.block_volumes.contains_key(id),
            EntityKind::PendingOperation => self.pending_operations.contains_key(id),
            EntityKind::DbAttribute => self.db_attributes.contains_key(id),
        }
    }

    /// Total entities across all kinds
    pub fn len(&self) -> usize {
        EntityKind::SCAN_ORDER.iter().map(|k| self.count(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the snapshot as 4-space indented JSON followed by a newline.
    pub fn write_json<W: Write>(&self, mut writer: W) -> io::Result<()> {
        {
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
            self.serialize(&mut ser).map_err(io::Error::from)?;
        }
        writeln!(writer)?;
        writer.flush()
    }

    /// The snapshot as a string, same bytes as [`Self::write_json`].
    pub fn to_json(&self) -> io::Result<String> {
        let mut buf = Vec::new();
        self.write_json(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
