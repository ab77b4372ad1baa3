//! Collaborators the churn driver talks to
//!
//! The driver only needs two things from a live system: a read transaction
//! over volumes and block volumes, and a runner that executes one lifecycle
//! operation to completion. Both are traits here; [`MemoryOrchestrator`] is
//! the in-process implementation used by tests and the `churn` command.

mod errors;
mod image;
mod memory;

pub use errors::{OperationError, OperationResult, StoreError, StoreResult};
pub use image::{write_image, ImageRecord, ImageStats, ImageWriter};
pub use memory::{MemoryConfig, MemoryOrchestrator};

use crate::entries::{BlockVolumeEntry, Durability, VolumeEntry};

/// Read-only view of the persistent store inside one transaction
pub trait StoreView {
    /// Identifiers of every volume
    fn volume_list(&self) -> StoreResult<Vec<String>>;

    fn volume(&self, id: &str) -> StoreResult<VolumeEntry>;

    /// Identifiers of every block volume
    fn block_volume_list(&self) -> StoreResult<Vec<String>>;

    fn block_volume(&self, id: &str) -> StoreResult<BlockVolumeEntry>;
}

/// A live system the churn driver can mutate
pub trait Orchestrator {
    /// Runs `f` inside one read transaction.
    fn view<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn StoreView) -> StoreResult<T>;

    /// Executes one operation to completion, blocking until it finishes.
    fn run_operation(&mut self, op: Operation) -> OperationResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeRequest {
    pub size: u64,
    pub durability: Durability,
}

/// Lifecycle operations the runner accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateVolume(VolumeRequest),
    DeleteVolume(VolumeEntry),
    CreateBlockVolume { size: u64 },
    DeleteBlockVolume(BlockVolumeEntry),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateVolume(_) => "create_volume",
            Operation::DeleteVolume(_) => "delete_volume",
            Operation::CreateBlockVolume { .. } => "create_block_volume",
            Operation::DeleteBlockVolume(_) => "delete_block_volume",
        }
    }
}
