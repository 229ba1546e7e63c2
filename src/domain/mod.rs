//! Core domain types for portal-sync

mod entity;
mod sync_run;

pub use entity::{
    AgentAttributes, EntityId, EntityKind, EntityPayload, PropertyAttributes, RemoteId,
    RemoteSyncState, SyncableEntity, VerificationStatus,
};
pub use sync_run::{ItemOutcome, ItemResult, SyncAction, SyncRun};
