//! What a churn run did, pass by pass

use serde::Serialize;

/// The four lifecycle actions a pass can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateVolume,
    DeleteVolume,
    CreateBlockVolume,
    DeleteBlockVolume,
}

impl Action {
    /// Indexed by the drawn action number
    pub const ALL: [Action; 4] = [
        Action::CreateVolume,
        Action::DeleteVolume,
        Action::CreateBlockVolume,
        Action::DeleteBlockVolume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateVolume => "create_volume",
            Action::DeleteVolume => "delete_volume",
            Action::CreateBlockVolume => "create_block_volume",
            Action::DeleteBlockVolume => "delete_block_volume",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// Operation runner accepted and completed the operation
    Submitted,
    /// Operation runner returned an error
    Failed(String),
    /// Nothing eligible; no operation was submitted
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub action: Action,
    /// Drawn size, for creates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Drawn index into the candidate list, for deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victim_index: Option<usize>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassRecord {
    /// Drawn selector, 0..=4; 4 is a burst
    pub selector: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst_count: Option<u32>,
    pub actions: Vec<ActionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChurnReport {
    pub passes: Vec<PassRecord>,
}

impl ChurnReport {
    /// Every action across every pass, in execution order
    pub fn actions(&self) -> impl Iterator<Item = &ActionRecord> {
        self.passes.iter().flat_map(|p| p.actions.iter())
    }

    pub fn submitted(&self) -> usize {
        self.actions()
            .filter(|a| a.outcome == Outcome::Submitted)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.actions()
            .filter(|a| matches!(a.outcome, Outcome::Failed(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.actions()
            .filter(|a| matches!(a.outcome, Outcome::Skipped(_)))
            .count()
    }
}
