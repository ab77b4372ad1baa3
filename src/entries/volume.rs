//! File volumes and the bricks they are assembled from

use serde::{Deserialize, Serialize};

use super::codec::{Decoder, Encoder};
use super::errors::{CodecError, CodecResult};
use super::{EntityKind, Entry};

/// Data protection scheme of a volume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityType {
    #[default]
    Replicate,
    Disperse,
    None,
}

/// Durability policy: replica count, or data/redundancy split for disperse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durability {
    #[serde(rename = "type")]
    pub kind: DurabilityType,
    pub replica: u32,
    pub data: u32,
    pub redundancy: u32,
}

impl Default for Durability {
    fn default() -> Self {
        Self::replicate(3)
    }
}

impl Durability {
    pub fn replicate(replica: u32) -> Self {
        Self {
            kind: DurabilityType::Replicate,
            replica,
            data: 0,
            redundancy: 0,
        }
    }

    /// Number of bricks one set of this policy needs.
    pub fn brick_count(&self) -> u32 {
        match self.kind {
            DurabilityType::Replicate => self.replica.max(1),
            DurabilityType::Disperse => self.data + self.redundancy,
            DurabilityType::None => 1,
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(match self.kind {
            DurabilityType::Replicate => 0,
            DurabilityType::Disperse => 1,
            DurabilityType::None => 2,
        });
        enc.put_u32(self.replica);
        enc.put_u32(self.data);
        enc.put_u32(self.redundancy);
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        let kind = match dec.get_u8("durability")? {
            0 => DurabilityType::Replicate,
            1 => DurabilityType::Disperse,
            2 => DurabilityType::None,
            value => {
                return Err(CodecError::InvalidDiscriminant {
                    field: "durability",
                    value,
                })
            }
        };
        Ok(Self {
            kind,
            replica: dec.get_u32("replica")?,
            data: dec.get_u32("data")?,
            redundancy: dec.get_u32("redundancy")?,
        })
    }
}

/// A slice of one device backing part of a volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrickEntry {
    pub id: String,
    pub path: String,
    pub device_id: String,
    pub node_id: String,
    pub volume_id: String,
    pub size: u64,
    /// Thin pool size
    pub tp_size: u64,
    pub pool_metadata_size: u64,
    pub gid: u64,
    /// Pending operation that created this brick, empty once committed
    pub pending_id: String,
}

impl Entry for BrickEntry {
    const KIND: EntityKind = EntityKind::Brick;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_str(&self.path);
        enc.put_str(&self.device_id);
        enc.put_str(&self.node_id);
        enc.put_str(&self.volume_id);
        enc.put_u64(self.size);
        enc.put_u64(self.tp_size);
        enc.put_u64(self.pool_metadata_size);
        enc.put_u64(self.gid);
        enc.put_str(&self.pending_id);
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: dec.get_string("id")?,
            path: dec.get_string("path")?,
            device_id: dec.get_string("device_id")?,
            node_id: dec.get_string("node_id")?,
            volume_id: dec.get_string("volume_id")?,
            size: dec.get_u64("size")?,
            tp_size: dec.get_u64("tp_size")?,
            pool_metadata_size: dec.get_u64("pool_metadata_size")?,
            gid: dec.get_u64("gid")?,
            pending_id: dec.get_string("pending_id")?,
        })
    }
}

/// A file volume, optionally hosting block volumes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub id: String,
    pub name: String,
    pub cluster_id: String,
    pub size: u64,
    pub durability: Durability,
    pub gid: u64,
    pub mount: String,
    pub bricks: Vec<String>,
    /// Volume is a block-hosting volume
    pub block: bool,
    pub block_free_size: u64,
    pub block_reserved_size: u64,
    pub block_volumes: Vec<String>,
    pub pending_id: String,
}

impl VolumeEntry {
    /// Volume hosts at least one block volume and cannot be deleted.
    pub fn hosts_block_volumes(&self) -> bool {
        !self.block_volumes.is_empty()
    }
}

impl Entry for VolumeEntry {
    const KIND: EntityKind = EntityKind::Volume;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_str(&self.name);
        enc.put_str(&self.cluster_id);
        enc.put_u64(self.size);
        self.durability.encode(enc);
        enc.put_u64(self.gid);
        enc.put_str(&self.mount);
        enc.put_strings(&self.bricks);
        enc.put_bool(self.block);
        enc.put_u64(self.block_free_size);
        enc.put_u64(self.block_reserved_size);
        enc.put_strings(&self.block_volumes);
        enc.put_str(&self.pending_id);
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: dec.get_string("id")?,
            name: dec.get_string("name")?,
            cluster_id: dec.get_string("cluster_id")?,
            size: dec.get_u64("size")?,
            durability: Durability::decode(dec)?,
            gid: dec.get_u64("gid")?,
            mount: dec.get_string("mount")?,
            bricks: dec.get_strings("bricks")?,
            block: dec.get_bool("block")?,
            block_free_size: dec.get_u64("block_free_size")?,
            block_reserved_size: dec.get_u64("block_reserved_size")?,
            block_volumes: dec.get_strings("block_volumes")?,
            pending_id: dec.get_string("pending_id")?,
        })
    }
}
