//! Pending operations: the change list of an in-flight lifecycle operation
//!
//! A pending entry is written before an operation touches any remote node
//! and removed once it commits. Entries left behind after a crash or a
//! failed rollback are what operators go looking for in a damaged store.

use serde::{Deserialize, Serialize};

use super::codec::{Decoder, Encoder};
use super::errors::{CodecError, CodecResult};
use super::{EntityKind, Entry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOperationType {
    #[default]
    CreateVolume,
    DeleteVolume,
    ExpandVolume,
    CreateBlockVolume,
    DeleteBlockVolume,
}

impl PendingOperationType {
    const ALL: [PendingOperationType; 5] = [
        PendingOperationType::CreateVolume,
        PendingOperationType::DeleteVolume,
        PendingOperationType::ExpandVolume,
        PendingOperationType::CreateBlockVolume,
        PendingOperationType::DeleteBlockVolume,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    AddBrick,
    AddVolume,
    DeleteBrick,
    DeleteVolume,
    AddBlockVolume,
    DeleteBlockVolume,
    AddHostingVolume,
    ExpandVolume,
}

impl ChangeType {
    const ALL: [ChangeType; 8] = [
        ChangeType::AddBrick,
        ChangeType::AddVolume,
        ChangeType::DeleteBrick,
        ChangeType::DeleteVolume,
        ChangeType::AddBlockVolume,
        ChangeType::DeleteBlockVolume,
        ChangeType::AddHostingVolume,
        ChangeType::ExpandVolume,
    ];
}

fn discriminant<T: Copy + PartialEq>(all: &[T], value: T) -> u8 {
    all.iter().position(|v| *v == value).unwrap_or(0) as u8
}

fn from_discriminant<T: Copy>(all: &[T], field: &'static str, value: u8) -> CodecResult<T> {
    all.get(value as usize)
        .copied()
        .ok_or(CodecError::InvalidDiscriminant { field, value })
}

/// One entity touched by a pending operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub change: ChangeType,
    pub id: String,
    /// Size delta, for expansions
    pub delta: i64,
}

impl PendingChange {
    pub fn new(change: ChangeType, id: impl Into<String>) -> Self {
        Self {
            change,
            id: id.into(),
            delta: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperationEntry {
    pub id: String,
    /// Unix seconds at which the operation was recorded
    pub timestamp: i64,
    pub op_type: PendingOperationType,
    pub actions: Vec<PendingChange>,
}

impl PendingOperationEntry {
    pub fn new(id: impl Into<String>, op_type: PendingOperationType, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            timestamp,
            op_type,
            actions: Vec::new(),
        }
    }

    pub fn record_change(&mut self, change: ChangeType, id: impl Into<String>) {
        self.actions.push(PendingChange::new(change, id));
    }
}

impl Entry for PendingOperationEntry {
    const KIND: EntityKind = EntityKind::PendingOperation;

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.id);
        enc.put_i64(self.timestamp);
        enc.put_u8(discriminant(&PendingOperationType::ALL, self.op_type));
        enc.put_list(&self.actions, |enc, action| {
            enc.put_u8(discriminant(&ChangeType::ALL, action.change));
            enc.put_str(&action.id);
            enc.put_i64(action.delta);
        });
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        let id = dec.get_string("id")?;
        let timestamp = dec.get_i64("timestamp")?;
        let op_type = from_discriminant(
            &PendingOperationType::ALL,
            "op_type",
            dec.get_u8("op_type")?,
        )?;
        let actions = dec.get_list("actions", |dec| {
            Ok(PendingChange {
                change: from_discriminant(&ChangeType::ALL, "change", dec.get_u8("change")?)?,
                id: dec.get_string("change_id")?,
                delta: dec.get_i64("delta")?,
            })
        })?;
        Ok(Self {
            id,
            timestamp,
            op_type,
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_operation_roundtrip() {
        let mut op = PendingOperationEntry::new("p1", PendingOperationType::CreateVolume, 1_700_000_000);
        op.record_change(ChangeType::AddVolume, "v1");
        op.record_change(ChangeType::AddBrick, "b1");
        op.actions.push(PendingChange {
            change: ChangeType::ExpandVolume,
            id: "v1".into(),
            delta: -5,
        });

        assert_eq!(PendingOperationEntry::unmarshal(&op.marshal()).unwrap(), op);
    }

    #[test]
    fn test_discriminants_are_stable() {
        assert_eq!(discriminant(&ChangeType::ALL, ChangeType::AddBrick), 0);
        assert_eq!(discriminant(&ChangeType::ALL, ChangeType::ExpandVolume), 7);
        assert!(from_discriminant(&ChangeType::ALL, "change", 8).is_err());
        assert_eq!(
            from_discriminant(&PendingOperationType::ALL, "op_type", 3).unwrap(),
            PendingOperationType::CreateBlockVolume
        );
    }
}
