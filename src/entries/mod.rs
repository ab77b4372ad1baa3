//! Persistent entity model for the cluster store
//!
//! Each kind of entity the orchestrator persists (clusters, nodes, devices,
//! bricks, volumes, block volumes, pending operations, db attributes) is
//! stored as one self-describing record (see [`codec`]). The same
//! `marshal`/`unmarshal` pair is used by the live store and by raw-dump
//! recovery; that identity is what makes scraping records out of an
//! unreadable store file possible at all.

mod attribute;
mod block_volume;
mod checksum;
pub mod codec;
mod errors;
mod pending;
mod topology;
mod volume;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use attribute::{DbAttributeEntry, DB_CLUSTER_HAS_FILE_BLOCK_FLAG};
pub use block_volume::BlockVolumeEntry;
pub use checksum::{compute_checksum, verify_checksum};
pub use codec::{Decoder, Encoder};
pub use errors::{CodecError, CodecResult};
pub use pending::{ChangeType, PendingChange, PendingOperationEntry, PendingOperationType};
pub use topology::{ClusterEntry, DeviceEntry, EntryState, NodeEntry};
pub use volume::{BrickEntry, Durability, DurabilityType, VolumeEntry};

/// The closed set of persisted entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Cluster,
    Node,
    Device,
    Brick,
    Volume,
    BlockVolume,
    PendingOperation,
    DbAttribute,
}

impl EntityKind {
    /// Fixed order in which a recovery run scans a dump, one kind at a time.
    pub const SCAN_ORDER: [EntityKind; 8] = [
        EntityKind::Volume,
        EntityKind::BlockVolume,
        EntityKind::Brick,
        EntityKind::Node,
        EntityKind::Device,
        EntityKind::Cluster,
        EntityKind::PendingOperation,
        EntityKind::DbAttribute,
    ];

    /// Type name written into every record of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "ClusterEntry",
            EntityKind::Node => "NodeEntry",
            EntityKind::Device => "DeviceEntry",
            EntityKind::Brick => "BrickEntry",
            EntityKind::Volume => "VolumeEntry",
            EntityKind::BlockVolume => "BlockVolumeEntry",
            EntityKind::PendingOperation => "PendingOperationEntry",
            EntityKind::DbAttribute => "DbAttributeEntry",
        }
    }

    /// Short lowercase name used in config, CLI flags and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "cluster",
            EntityKind::Node => "node",
            EntityKind::Device => "device",
            EntityKind::Brick => "brick",
            EntityKind::Volume => "volume",
            EntityKind::BlockVolume => "block_volume",
            EntityKind::PendingOperation => "pending_operation",
            EntityKind::DbAttribute => "db_attribute",
        }
    }

    /// Bucket the live store keeps this kind in.
    pub fn bucket(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "CLUSTER",
            EntityKind::Node => "NODE",
            EntityKind::Device => "DEVICE",
            EntityKind::Brick => "BRICK",
            EntityKind::Volume => "VOLUME",
            EntityKind::BlockVolume => "BLOCKVOLUME",
            EntityKind::PendingOperation => "PENDING_OPERATION",
            EntityKind::DbAttribute => "DBATTRIBUTE",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::SCAN_ORDER
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind '{}'", s))
    }
}

/// A persisted entity with a record encoding.
pub trait Entry: Sized + Clone + fmt::Debug + Serialize {
    /// Kind this entity is stored as
    const KIND: EntityKind;

    /// Unique identifier; empty means the record is unusable.
    fn id(&self) -> &str;

    /// Writes the kind-specific fields.
    fn encode_body(&self, enc: &mut Encoder);

    /// Reads the kind-specific fields in the order `encode_body` wrote them.
    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self>;

    /// Serializes into a complete framed record.
    fn marshal(&self) -> Vec<u8> {
        codec::marshal_record(Self::KIND.type_name(), |enc| self.encode_body(enc))
    }

    /// Deserializes exactly one framed record.
    fn unmarshal(window: &[u8]) -> CodecResult<Self> {
        codec::unmarshal_record(window, Self::KIND.type_name(), Self::decode_body)
    }
}
