//! Cluster topology entities: clusters, nodes and devices

use serde::{Deserialize, Serialize};

use super::codec::{Decoder, Encoder};
use super::errors::{CodecError, CodecResult};
use super::{EntityKind, Entry};

/// Administrative state of a node or device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    #[default]
    Online,
    Offline,
    Failed,
}

impl EntryState {
    fn to_u8(self) -> u8 {
        match self {
            EntryState::Online => 0,
            EntryState::Offline => 1,
            EntryState::Failed => 2,
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        match dec.get_u8("state")? {
            0 => Ok(EntryState::Online),
            1 => Ok(EntryState::Offline),
            2 => Ok(EntryState::Failed),
            value => Err(CodecError::InvalidDiscriminant {
                field: "state",
                value,
            }),
        }
    }
}

/// A cluster and the nodes, volumes and block volumes it owns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub id: String,
    pub nodes: Vec<String>,
    pub volumes: Vec<String>,
    pub block_volumes: Vec<String>,
    /// Cluster accepts block-hosting volumes
    pub block: bool,
    /// Cluster accepts regular file volumes
    pub file: bool,
}

impl ClusterEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block: true,
            file: true,
            ..Self::default()
        }
    }
}

impl Entry for ClusterEntry {
    const KIND: EntityKind = EntityKind::Cluster;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_strings(&self.nodes);
        enc.put_strings(&self.volumes);
        enc.put_strings(&self.block_volumes);
        enc.put_bool(self.block);
        enc.put_bool(self.file);
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: dec.get_string("id")?,
            nodes: dec.get_strings("nodes")?,
            volumes: dec.get_strings("volumes")?,
            block_volumes: dec.get_strings("block_volumes")?,
            block: dec.get_bool("block")?,
            file: dec.get_bool("file")?,
        })
    }
}

/// A storage node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    pub cluster_id: String,
    pub zone: u32,
    pub manage_hostnames: Vec<String>,
    pub storage_hostnames: Vec<String>,
    pub state: EntryState,
    pub devices: Vec<String>,
}

impl Entry for NodeEntry {
    const KIND: EntityKind = EntityKind::Node;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_str(&self.cluster_id);
        enc.put_u32(self.zone);
        enc.put_strings(&self.manage_hostnames);
        enc.put_strings(&self.storage_hostnames);
        enc.put_u8(self.state.to_u8());
        enc.put_strings(&self.devices);
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: dec.get_string("id")?,
            cluster_id: dec.get_string("cluster_id")?,
            zone: dec.get_u32("zone")?,
            manage_hostnames: dec.get_strings("manage_hostnames")?,
            storage_hostnames: dec.get_strings("storage_hostnames")?,
            state: EntryState::decode(dec)?,
            devices: dec.get_strings("devices")?,
        })
    }
}

/// A raw block device on a node, carved into bricks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub name: String,
    pub node_id: String,
    pub state: EntryState,
    pub total_size: u64,
    pub free_size: u64,
    pub used_size: u64,
    pub extent_size: u64,
    pub bricks: Vec<String>,
}

impl DeviceEntry {
    /// Takes `size` from the free pool. Returns false if it does not fit.
    pub fn allocate(&mut self, size: u64) -> bool {
        if self.state != EntryState::Online || self.free_size < size {
            return false;
        }
        self.free_size -= size;
        self.used_size += size;
        true
    }

    /// Returns `size` to the free pool.
    pub fn release(&mut self, size: u64) {
        let size = size.min(self.used_size);
        self.used_size -= size;
        self.free_size += size;
    }
}

impl Entry for DeviceEntry {
    const KIND: EntityKind = EntityKind::Device;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_str(&self.name);
        enc.put_str(&self.node_id);
        enc.put_u8(self.state.to_u8());
        enc.put_u64(self.total_size);
        enc.put_u64(self.free_size);
        enc.put_u64(self.used_size);
        enc.put_u64(self.extent_size);
        enc.put_strings(&self.bricks);
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: dec.get_string("id")?,
            name: dec.get_string("name")?,
            node_id: dec.get_string("node_id")?,
            state: EntryState::decode(dec)?,
            total_size: dec.get_u64("total_size")?,
            free_size: dec.get_u64("free_size")?,
            used_size: dec.get_u64("used_size")?,
            extent_size: dec.get_u64("extent_size")?,
            bricks: dec.get_strings("bricks")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_record_roundtrip() {
        let mut cluster = ClusterEntry::new("c1");
        cluster.nodes = vec!["n1".into(), "n2".into()];
        cluster.volumes = vec!["v1".into()];

        let record = cluster.marshal();
        assert_eq!(ClusterEntry::unmarshal(&record).unwrap(), cluster);
    }

    #[test]
    fn test_node_record_rejected_as_device() {
        let node = NodeEntry {
            id: "n1".into(),
            cluster_id: "c1".into(),
            zone: 1,
            manage_hostnames: vec!["host-1".into()],
            storage_hostnames: vec!["10.0.0.1".into()],
            state: EntryState::Offline,
            devices: vec!["d1".into()],
        };
        let record = node.marshal();
        assert_eq!(NodeEntry::unmarshal(&record).unwrap(), node);
        assert!(matches!(
            DeviceEntry::unmarshal(&record),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_device_allocation_accounting() {
        let mut device = DeviceEntry {
            id: "d1".into(),
            total_size: 100,
            free_size: 100,
            ..DeviceEntry::default()
        };
        assert!(device.allocate(60));
        assert!(!device.allocate(50));
        assert_eq!(device.free_size, 40);
        assert_eq!(device.used_size, 60);

        device.release(60);
        assert_eq!(device.free_size, 100);
        assert_eq!(device.used_size, 0);
    }

    #[test]
    fn test_offline_device_refuses_allocation() {
        let mut device = DeviceEntry {
            id: "d1".into(),
            state: EntryState::Offline,
            total_size: 100,
            free_size: 100,
            ..DeviceEntry::default()
        };
        assert!(!device.allocate(1));
    }

    #[test]
    fn test_invalid_state_discriminant() {
        let device = DeviceEntry {
            id: "d1".into(),
            ..DeviceEntry::default()
        };
        let mut record = device.marshal();
        // id(4+2) name(4) node_id(4) after the type name
        let state_at = 4 + 3 + "DeviceEntry".len() + 6 + 4 + 4;
        record[state_at] = 9;
        let body_end = record.len() - 4;
        let checksum = super::super::compute_checksum(&record[..body_end]);
        record[body_end..].copy_from_slice(&checksum.to_le_bytes());

        assert_eq!(
            DeviceEntry::unmarshal(&record).unwrap_err(),
            CodecError::InvalidDiscriminant {
                field: "state",
                value: 9
            }
        );
    }
}
