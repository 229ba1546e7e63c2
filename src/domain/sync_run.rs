use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityId, EntityKind, RemoteId};

/// What the reconciler did (or tried to do) for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    /// Update hit a missing portal record and the entity was created again
    Recreate,
    Deactivate,
    /// Nothing to send: unchanged, already deactivated, or never published
    Skip,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Update => "update",
            SyncAction::Recreate => "recreate",
            SyncAction::Deactivate => "deactivate",
            SyncAction::Skip => "skip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(SyncAction::Create),
            "update" => Some(SyncAction::Update),
            "recreate" => Some(SyncAction::Recreate),
            "deactivate" => Some(SyncAction::Deactivate),
            "skip" => Some(SyncAction::Skip),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Success,
    Failure,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Success => "success",
            ItemOutcome::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(ItemOutcome::Success),
            "failure" => Some(ItemOutcome::Failure),
            _ => None,
        }
    }
}

/// Result of reconciling a single entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub entity_id: EntityId,
    pub entity_kind: EntityKind,
    pub action: SyncAction,
    pub outcome: ItemOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Portal id after the action, when one is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
}

impl ItemResult {
    pub fn success(
        entity_id: impl Into<EntityId>,
        entity_kind: EntityKind,
        action: SyncAction,
        remote_id: Option<RemoteId>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_kind,
            action,
            outcome: ItemOutcome::Success,
            error_detail: None,
            remote_id,
        }
    }

    pub fn failure(
        entity_id: impl Into<EntityId>,
        entity_kind: EntityKind,
        action: SyncAction,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_kind,
            action,
            outcome: ItemOutcome::Failure,
            error_detail: Some(detail.into()),
            remote_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ItemOutcome::Success
    }
}

/// Summary of one batch reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Entities in the run (reduced to the processed ones on cancellation)
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// True when the caller cancelled before every entity was processed
    #[serde(default)]
    pub cancelled: bool,
    pub items: Vec<ItemResult>,
}

impl SyncRun {
    pub fn new(total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            total,
            succeeded: 0,
            failed: 0,
            cancelled: false,
            items: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Successful items that needed no portal call
    pub fn skipped(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.is_success() && item.action == SyncAction::Skip)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| !item.is_success())
    }
}
