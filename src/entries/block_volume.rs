//! Block volumes carved out of block-hosting file volumes

use serde::{Deserialize, Serialize};

use super::codec::{Decoder, Encoder};
use super::errors::CodecResult;
use super::{EntityKind, Entry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVolumeEntry {
    pub id: String,
    pub name: String,
    pub cluster_id: String,
    pub size: u64,
    pub hacount: u32,
    /// Volume whose space backs this block volume
    pub hosting_volume: String,
    pub hosts: Vec<String>,
    pub pending_id: String,
}

impl Entry for BlockVolumeEntry {
    const KIND: EntityKind = EntityKind::BlockVolume;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_str(&self.name);
        enc.put_str(&self.cluster_id);
        enc.put_u64(self.size);
        enc.put_u32(self.hacount);
        enc.put_str(&self.hosting_volume);
        enc.put_strings(&self.hosts);
        enc.put_str(&self.pending_id);
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: dec.get_string("id")?,
            name: dec.get_string("name")?,
            cluster_id: dec.get_string("cluster_id")?,
            size: dec.get_u64("size")?,
            hacount: dec.get_u32("hacount")?,
            hosting_volume: dec.get_string("hosting_volume")?,
            hosts: dec.get_strings("hosts")?,
            pending_id: dec.get_string("pending_id")?,
        })
    }
}
