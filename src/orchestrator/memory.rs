//! In-memory reference orchestrator
//!
//! Keeps every entity in ordered maps, so listings and images come out in
//! identifier order. Identifiers are 32 hex digits drawn from a counter,
//! which keeps whole runs reproducible.
//!
//! Each operation runs in three steps:
//! 1. plan against current state (no changes on error)
//! 2. write the pending entry and the entities it touches
//! 3. commit: drop the pending marker and apply the final state
//!
//! With a fault rate set, a seeded fault source can fail an operation
//! between steps 2 and 3. The pending entry and half-applied entities stay
//! behind, the same debris a crashed orchestrator leaves in its store.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entries::{
    BlockVolumeEntry, BrickEntry, ChangeType, ClusterEntry, DbAttributeEntry, DeviceEntry,
    Durability, EntityKind, EntryState, NodeEntry, PendingOperationEntry,
    PendingOperationType, VolumeEntry, DB_CLUSTER_HAS_FILE_BLOCK_FLAG,
};

use super::errors::{OperationError, OperationResult, StoreError, StoreResult};
use super::image::ImageRecord;
use super::{Operation, Orchestrator, StoreView, VolumeRequest};

/// Smallest block-hosting volume created on demand
const MIN_HOSTING_VOLUME_SIZE: u64 = 100;

/// Block volumes are exported from this many nodes
const BLOCK_HA_COUNT: u32 = 3;

const FIRST_GID: u64 = 2000;

/// Shape of the provisioned cluster and its fault source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_nodes")]
    pub nodes: usize,
    #[serde(default = "default_device_size")]
    pub device_size: u64,
    /// Probability in [0, 1] that an operation fails after its pending
    /// entry is written
    #[serde(default)]
    pub fault_rate: f64,
    #[serde(default)]
    pub fault_seed: u64,
}

fn default_nodes() -> usize {
    3
}

fn default_device_size() -> u64 {
    2000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            device_size: default_device_size(),
            fault_rate: 0.0,
            fault_seed: 0,
        }
    }
}

pub struct MemoryOrchestrator {
    cluster: ClusterEntry,
    nodes: BTreeMap<String, NodeEntry>,
    devices: BTreeMap<String, DeviceEntry>,
    bricks: BTreeMap<String, BrickEntry>,
    volumes: BTreeMap<String, VolumeEntry>,
    block_volumes: BTreeMap<String, BlockVolumeEntry>,
    pending: BTreeMap<String, PendingOperationEntry>,
    attributes: BTreeMap<String, DbAttributeEntry>,
    next_id: u128,
    next_gid: u64,
    fault_rate: f64,
    faults: StdRng,
}

impl MemoryOrchestrator {
    /// Provisions one cluster with `config.nodes` nodes, one device each.
    pub fn new(config: &MemoryConfig) -> Self {
        let mut orch = Self {
            cluster: ClusterEntry::default(),
            nodes: BTreeMap::new(),
            devices: BTreeMap::new(),
            bricks: BTreeMap::new(),
            volumes: BTreeMap::new(),
            block_volumes: BTreeMap::new(),
            pending: BTreeMap::new(),
            attributes: BTreeMap::new(),
            next_id: 1,
            next_gid: FIRST_GID,
            fault_rate: config.fault_rate,
            faults: StdRng::seed_from_u64(config.fault_seed),
        };

        orch.cluster = ClusterEntry::new(orch.allocate_id());
        for n in 0..config.nodes {
            let node_id = orch.allocate_id();
            let device_id = orch.allocate_id();
            let host = format!("node{}.storage.local", n);
            orch.devices.insert(
                device_id.clone(),
                DeviceEntry {
                    id: device_id.clone(),
                    name: "/dev/sdb".into(),
                    node_id: node_id.clone(),
                    state: EntryState::Online,
                    total_size: config.device_size,
                    free_size: config.device_size,
                    used_size: 0,
                    extent_size: 4096,
                    bricks: Vec::new(),
                },
            );
            orch.nodes.insert(
                node_id.clone(),
                NodeEntry {
                    id: node_id.clone(),
                    cluster_id: orch.cluster.id.clone(),
                    zone: (n % 3) as u32 + 1,
                    manage_hostnames: vec![host.clone()],
                    storage_hostnames: vec![host],
                    state: EntryState::Online,
                    devices: vec![device_id],
                },
            );
            orch.cluster.nodes.push(node_id);
        }
        orch.attributes.insert(
            DB_CLUSTER_HAS_FILE_BLOCK_FLAG.to_string(),
            DbAttributeEntry::new(DB_CLUSTER_HAS_FILE_BLOCK_FLAG, "yes"),
        );
        orch
    }

    pub fn cluster(&self) -> &ClusterEntry {
        &self.cluster
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeEntry> {
        self.nodes.values()
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.values()
    }

    pub fn bricks(&self) -> impl Iterator<Item = &BrickEntry> {
        self.bricks.values()
    }

    pub fn volumes(&self) -> impl Iterator<Item = &VolumeEntry> {
        self.volumes.values()
    }

    pub fn block_volumes(&self) -> impl Iterator<Item = &BlockVolumeEntry> {
        self.block_volumes.values()
    }

    /// Pending entries left by failed operations
    pub fn pending_operations(&self) -> impl Iterator<Item = &PendingOperationEntry> {
        self.pending.values()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &DbAttributeEntry> {
        self.attributes.values()
    }

    /// Every entity as it would sit in the store, grouped by bucket.
    pub fn records(&self) -> Vec<ImageRecord> {
        let mut records = vec![ImageRecord::of(&self.cluster)];
        records.extend(self.nodes.values().map(ImageRecord::of));
        records.extend(self.devices.values().map(ImageRecord::of));
        records.extend(self.volumes.values().map(ImageRecord::of));
        records.extend(self.bricks.values().map(ImageRecord::of));
        records.extend(self.block_volumes.values().map(ImageRecord::of));
        records.extend(self.pending.values().map(ImageRecord::of));
        records.extend(self.attributes.values().map(ImageRecord::of));
        records
    }

    fn allocate_id(&mut self) -> String {
        let id = Uuid::from_u128(self.next_id).simple().to_string();
        self.next_id += 1;
        id
    }

    fn allocate_gid(&mut self) -> u64 {
        let gid = self.next_gid;
        self.next_gid += 1;
        gid
    }

    fn inject_fault(&mut self, operation: &'static str) -> OperationResult<()> {
        if self.fault_rate > 0.0 && self.faults.gen::<f64>() < self.fault_rate {
            return Err(OperationError::InjectedFault { operation });
        }
        Ok(())
    }

    fn begin(&mut self, op_type: PendingOperationType) -> PendingOperationEntry {
        let id = self.allocate_id();
        PendingOperationEntry::new(id, op_type, Utc::now().timestamp())
    }

    /// One device per node with room for `size`, most free space first.
    fn place_bricks(&self, size: u64, count: u32) -> OperationResult<Vec<String>> {
        let mut candidates: Vec<&DeviceEntry> = self
            .devices
            .values()
            .filter(|d| d.state == EntryState::Online && d.free_size >= size)
            .collect();
        candidates.sort_by(|a, b| b.free_size.cmp(&a.free_size).then(a.id.cmp(&b.id)));

        let mut placed: Vec<String> = Vec::new();
        let mut used_nodes: Vec<&str> = Vec::new();
        for device in candidates {
            if used_nodes.contains(&device.node_id.as_str()) {
                continue;
            }
            used_nodes.push(&device.node_id);
            placed.push(device.id.clone());
            if placed.len() == count as usize {
                return Ok(placed);
            }
        }
        Err(OperationError::NoSpace {
            size,
            replicas: count,
        })
    }

    /// Allocates a volume and its bricks, all marked with `pending`'s id.
    fn add_volume(
        &mut self,
        pending: &mut PendingOperationEntry,
        size: u64,
        durability: Durability,
        block: bool,
    ) -> OperationResult<String> {
        let devices = self.place_bricks(size, durability.brick_count())?;
        let volume_id = self.allocate_id();
        let name = format!("vol_{}", volume_id);
        pending.record_change(
            if block {
                ChangeType::AddHostingVolume
            } else {
                ChangeType::AddVolume
            },
            &volume_id,
        );

        let mut brick_ids = Vec::with_capacity(devices.len());
        for device_id in devices {
            let brick_id = self.allocate_id();
            let device = self
                .devices
                .get_mut(&device_id)
                .ok_or_else(|| OperationError::NotFound {
                    kind: EntityKind::Device,
                    id: device_id.clone(),
                })?;
            if !device.allocate(size) {
                return Err(OperationError::NoSpace {
                    size,
                    replicas: durability.brick_count(),
                });
            }
            device.bricks.push(brick_id.clone());
            let node_id = device.node_id.clone();

            self.bricks.insert(
                brick_id.clone(),
                BrickEntry {
                    id: brick_id.clone(),
                    path: format!(
                        "/var/lib/storage/mounts/vg_{}/brick_{}/brick",
                        device_id, brick_id
                    ),
                    device_id,
                    node_id,
                    volume_id: volume_id.clone(),
                    size,
                    tp_size: size,
                    pool_metadata_size: (size / 200).max(1),
                    gid: 0,
                    pending_id: pending.id.clone(),
                },
            );
            pending.record_change(ChangeType::AddBrick, &brick_id);
            brick_ids.push(brick_id);
        }

        let host = self
            .nodes
            .values()
            .next()
            .and_then(|n| n.storage_hostnames.first().cloned())
            .unwrap_or_default();
        let gid = self.allocate_gid();
        self.volumes.insert(
            volume_id.clone(),
            VolumeEntry {
                id: volume_id.clone(),
                mount: format!("{}:{}", host, name),
                name,
                cluster_id: self.cluster.id.clone(),
                size,
                durability,
                gid,
                bricks: brick_ids,
                block,
                block_free_size: if block { size } else { 0 },
                block_reserved_size: 0,
                block_volumes: Vec::new(),
                pending_id: pending.id.clone(),
            },
        );
        self.cluster.volumes.push(volume_id.clone());
        Ok(volume_id)
    }

    /// Clears the pending marker from everything the operation touched.
    fn commit(&mut self, pending_id: &str) {
        for brick in self.bricks.values_mut() {
            if brick.pending_id == pending_id {
                brick.pending_id.clear();
            }
        }
        for volume in self.volumes.values_mut() {
            if volume.pending_id == pending_id {
                volume.pending_id.clear();
            }
        }
        for block_volume in self.block_volumes.values_mut() {
            if block_volume.pending_id == pending_id {
                block_volume.pending_id.clear();
            }
        }
        self.pending.remove(pending_id);
    }

    fn create_volume(&mut self, request: VolumeRequest) -> OperationResult<()> {
        self.place_bricks(request.size, request.durability.brick_count())?;

        let mut pending = self.begin(PendingOperationType::CreateVolume);
        self.add_volume(&mut pending, request.size, request.durability, false)?;
        let pending_id = pending.id.clone();
        self.pending.insert(pending_id.clone(), pending);

        self.inject_fault("create_volume")?;
        self.commit(&pending_id);
        Ok(())
    }

    fn delete_volume(&mut self, target: &VolumeEntry) -> OperationResult<()> {
        let volume = self
            .volumes
            .get(&target.id)
            .ok_or_else(|| OperationError::NotFound {
                kind: EntityKind::Volume,
                id: target.id.clone(),
            })?;
        if volume.hosts_block_volumes() {
            return Err(OperationError::Busy {
                id: volume.id.clone(),
                reason: format!("hosts {} block volumes", volume.block_volumes.len()),
            });
        }
        let brick_ids = volume.bricks.clone();

        let mut pending = self.begin(PendingOperationType::DeleteVolume);
        pending.record_change(ChangeType::DeleteVolume, &target.id);
        for brick_id in &brick_ids {
            pending.record_change(ChangeType::DeleteBrick, brick_id);
        }
        let pending_id = pending.id.clone();
        self.pending.insert(pending_id.clone(), pending);
        if let Some(volume) = self.volumes.get_mut(&target.id) {
            volume.pending_id = pending_id.clone();
        }

        self.inject_fault("delete_volume")?;

        for brick_id in &brick_ids {
            if let Some(brick) = self.bricks.remove(brick_id) {
                if let Some(device) = self.devices.get_mut(&brick.device_id) {
                    device.release(brick.size);
                    device.bricks.retain(|b| b != brick_id);
                }
            }
        }
        self.volumes.remove(&target.id);
        self.cluster.volumes.retain(|v| v != &target.id);
        self.pending.remove(&pending_id);
        Ok(())
    }

    fn create_block_volume(&mut self, size: u64) -> OperationResult<()> {
        let existing = self
            .volumes
            .values()
            .find(|v| v.block && v.pending_id.is_empty() && v.block_free_size >= size)
            .map(|v| v.id.clone());
        if existing.is_none() {
            let hosting_size = size.max(MIN_HOSTING_VOLUME_SIZE);
            self.place_bricks(hosting_size, Durability::default().brick_count())?;
        }

        let mut pending = self.begin(PendingOperationType::CreateBlockVolume);
        let hosting_id = match existing {
            Some(id) => id,
            None => self.add_volume(
                &mut pending,
                size.max(MIN_HOSTING_VOLUME_SIZE),
                Durability::default(),
                true,
            )?,
        };

        let block_id = self.allocate_id();
        pending.record_change(ChangeType::AddBlockVolume, &block_id);
        let pending_id = pending.id.clone();

        let hosting = self
            .volumes
            .get_mut(&hosting_id)
            .ok_or_else(|| OperationError::NotFound {
                kind: EntityKind::Volume,
                id: hosting_id.clone(),
            })?;
        hosting.block_free_size -= size;
        hosting.block_volumes.push(block_id.clone());
        let hosting_bricks = hosting.bricks.clone();

        let hosts: Vec<String> = hosting_bricks
            .iter()
            .filter_map(|b| self.bricks.get(b))
            .filter_map(|b| self.nodes.get(&b.node_id))
            .filter_map(|n| n.storage_hostnames.first().cloned())
            .collect();

        self.block_volumes.insert(
            block_id.clone(),
            BlockVolumeEntry {
                id: block_id.clone(),
                name: format!("blockvol_{}", block_id),
                cluster_id: self.cluster.id.clone(),
                size,
                hacount: BLOCK_HA_COUNT,
                hosting_volume: hosting_id,
                hosts,
                pending_id: pending_id.clone(),
            },
        );
        self.cluster.block_volumes.push(block_id);
        self.pending.insert(pending_id.clone(), pending);

        self.inject_fault("create_block_volume")?;
        self.commit(&pending_id);
        Ok(())
    }

    fn delete_block_volume(&mut self, target: &BlockVolumeEntry) -> OperationResult<()> {
        let block_volume =
            self.block_volumes
                .get(&target.id)
                .ok_or_else(|| OperationError::NotFound {
                    kind: EntityKind::BlockVolume,
                    id: target.id.clone(),
                })?;
        let (size, hosting_id) = (block_volume.size, block_volume.hosting_volume.clone());

        let mut pending = self.begin(PendingOperationType::DeleteBlockVolume);
        pending.record_change(ChangeType::DeleteBlockVolume, &target.id);
        let pending_id = pending.id.clone();
        self.pending.insert(pending_id.clone(), pending);
        if let Some(block_volume) = self.block_volumes.get_mut(&target.id) {
            block_volume.pending_id = pending_id.clone();
        }

        self.inject_fault("delete_block_volume")?;

        self.block_volumes.remove(&target.id);
        self.cluster.block_volumes.retain(|b| b != &target.id);
        if let Some(hosting) = self.volumes.get_mut(&hosting_id) {
            hosting.block_free_size += size;
            hosting.block_volumes.retain(|b| b != &target.id);
        }
        self.pending.remove(&pending_id);
        Ok(())
    }
}

impl StoreView for MemoryOrchestrator {
    fn volume_list(&self) -> StoreResult<Vec<String>> {
        Ok(self.volumes.keys().cloned().collect())
    }

    fn volume(&self, id: &str) -> StoreResult<VolumeEntry> {
        self.volumes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Volume, id))
    }

    fn block_volume_list(&self) -> StoreResult<Vec<String>> {
        Ok(self.block_volumes.keys().cloned().collect())
    }

    fn block_volume(&self, id: &str) -> StoreResult<BlockVolumeEntry> {
        self.block_volumes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::BlockVolume, id))
    }
}

impl Orchestrator for MemoryOrchestrator {
    fn view<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn StoreView) -> StoreResult<T>,
    {
        f(self)
    }

    fn run_operation(&mut self, op: Operation) -> OperationResult<()> {
        match op {
            Operation::CreateVolume(request) => self.create_volume(request),
            Operation::DeleteVolume(volume) => self.delete_volume(&volume),
            Operation::CreateBlockVolume { size } => self.create_block_volume(size),
            Operation::DeleteBlockVolume(block_volume) => self.delete_block_volume(&block_volume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator() -> MemoryOrchestrator {
        MemoryOrchestrator::new(&MemoryConfig::default())
    }

    fn create_volume(orch: &mut MemoryOrchestrator, size: u64) -> OperationResult<()> {
        orch.run_operation(Operation::CreateVolume(VolumeRequest {
            size,
            durability: Durability::replicate(3),
        }))
    }

    fn only_volume(orch: &MemoryOrchestrator) -> VolumeEntry {
        orch.volumes().next().cloned().unwrap()
    }

    #[test]
    fn test_provisioning() {
        let orch = orchestrator();
        assert_eq!(orch.nodes().count(), 3);
        assert_eq!(orch.devices().count(), 3);
        assert_eq!(orch.cluster().nodes.len(), 3);
        assert_eq!(orch.cluster().id.len(), 32);
        assert_eq!(orch.attributes().count(), 1);
    }

    #[test]
    fn test_ids_are_deterministic() {
        let a = orchestrator();
        let b = orchestrator();
        assert_eq!(a.cluster().id, b.cluster().id);
        assert_eq!(
            a.nodes().map(|n| n.id.clone()).collect::<Vec<_>>(),
            b.nodes().map(|n| n.id.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_create_volume_places_replicas_on_distinct_nodes() {
        let mut orch = orchestrator();
        create_volume(&mut orch, 10).unwrap();

        let volume = only_volume(&orch);
        assert_eq!(volume.bricks.len(), 3);
        assert!(volume.pending_id.is_empty());

        let mut nodes: Vec<String> = orch.bricks().map(|b| b.node_id.clone()).collect();
        nodes.sort();
        nodes.dedup();
        assert_eq!(nodes.len(), 3);
        assert!(orch.devices().all(|d| d.used_size == 10));
        assert_eq!(orch.pending_operations().count(), 0);
    }

    #[test]
    fn test_create_volume_without_space() {
        let mut orch = MemoryOrchestrator::new(&MemoryConfig {
            device_size: 5,
            ..MemoryConfig::default()
        });
        assert_eq!(
            create_volume(&mut orch, 10),
            Err(OperationError::NoSpace {
                size: 10,
                replicas: 3
            })
        );
        assert_eq!(orch.volumes().count(), 0);
        assert_eq!(orch.pending_operations().count(), 0);
    }

    #[test]
    fn test_delete_volume_frees_space() {
        let mut orch = orchestrator();
        create_volume(&mut orch, 10).unwrap();
        let volume = only_volume(&orch);

        orch.run_operation(Operation::DeleteVolume(volume)).unwrap();
        assert_eq!(orch.volumes().count(), 0);
        assert_eq!(orch.bricks().count(), 0);
        assert!(orch.devices().all(|d| d.used_size == 0 && d.bricks.is_empty()));
        assert!(orch.cluster().volumes.is_empty());
    }

    #[test]
    fn test_block_volume_creates_and_reuses_hosting_volume() {
        let mut orch = orchestrator();
        orch.run_operation(Operation::CreateBlockVolume { size: 20 })
            .unwrap();
        orch.run_operation(Operation::CreateBlockVolume { size: 5 })
            .unwrap();

        assert_eq!(orch.volumes().count(), 1);
        let hosting = only_volume(&orch);
        assert!(hosting.block);
        assert_eq!(hosting.size, 100);
        assert_eq!(hosting.block_free_size, 75);
        assert_eq!(hosting.block_volumes.len(), 2);

        let block = orch.block_volumes().next().unwrap();
        assert_eq!(block.hosting_volume, hosting.id);
        assert_eq!(block.hosts.len(), 3);
    }

    #[test]
    fn test_hosting_volume_is_busy() {
        let mut orch = orchestrator();
        orch.run_operation(Operation::CreateBlockVolume { size: 4 })
            .unwrap();
        let hosting = only_volume(&orch);

        let err = orch
            .run_operation(Operation::DeleteVolume(hosting))
            .unwrap_err();
        assert_eq!(err.code(), "CHURN_OP_BUSY");
    }

    #[test]
    fn test_delete_block_volume_returns_space() {
        let mut orch = orchestrator();
        orch.run_operation(Operation::CreateBlockVolume { size: 10 })
            .unwrap();
        let block = orch.block_volumes().next().cloned().unwrap();

        orch.run_operation(Operation::DeleteBlockVolume(block))
            .unwrap();
        let hosting = only_volume(&orch);
        assert_eq!(hosting.block_free_size, 100);
        assert!(!hosting.hosts_block_volumes());
        assert_eq!(orch.block_volumes().count(), 0);
    }

    #[test]
    fn test_delete_missing_volume() {
        let mut orch = orchestrator();
        let ghost = VolumeEntry {
            id: "ghost".into(),
            ..VolumeEntry::default()
        };
        assert!(matches!(
            orch.run_operation(Operation::DeleteVolume(ghost)),
            Err(OperationError::NotFound { .. })
        ));
    }

    #[test]
    fn test_fault_leaves_pending_entry_behind() {
        let mut orch = MemoryOrchestrator::new(&MemoryConfig {
            fault_rate: 1.0,
            ..MemoryConfig::default()
        });
        let err = create_volume(&mut orch, 10).unwrap_err();
        assert_eq!(
            err,
            OperationError::InjectedFault {
                operation: "create_volume"
            }
        );

        let pending = orch.pending_operations().next().unwrap();
        assert_eq!(pending.op_type, PendingOperationType::CreateVolume);
        assert_eq!(pending.actions.len(), 4);
        assert_eq!(only_volume(&orch).pending_id, pending.id);
    }

    #[test]
    fn test_view_reads_through_trait() {
        let mut orch = orchestrator();
        create_volume(&mut orch, 3).unwrap();
        let ids = orch.view(|tx| tx.volume_list()).unwrap();
        assert_eq!(ids.len(), 1);
        let volume = orch.view(|tx| tx.volume(&ids[0])).unwrap();
        assert_eq!(volume.size, 3);
        assert!(orch.view(|tx| tx.block_volume("nope")).is_err());
    }

    #[test]
    fn test_records_cover_every_entity() {
        let mut orch = orchestrator();
        create_volume(&mut orch, 3).unwrap();
        orch.run_operation(Operation::CreateBlockVolume { size: 4 })
            .unwrap();

        let records = orch.records();
        // cluster + 3 nodes + 3 devices + 2 volumes + 6 bricks + 1 block + 1 attribute
        assert_eq!(records.len(), 17);
        assert!(records.iter().all(|r| !r.bytes.is_empty()));
    }
}
