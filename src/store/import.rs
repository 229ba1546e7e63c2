//! CRM export format accepted by `portal-sync import`
//!
//! ```json
//! {
//!   "agents": [{ "id": "agent-1", "firstName": "Sara", "pfAgentId": "1042", ... }],
//!   "properties": [{ "id": "prop-1", "isActive": false, "title": "Villa", ... }]
//! }
//! ```
//!
//! Attribute keys are those of [`PropertyAttributes`] / [`AgentAttributes`].
//! The `pf*` keys carry portal state for records published before the import.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{
    AgentAttributes, PropertyAttributes, RemoteSyncState, SyncableEntity, VerificationStatus,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportDocument {
    #[serde(default)]
    agents: Vec<AgentRecord>,
    #[serde(default)]
    properties: Vec<PropertyRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyRecord {
    id: String,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    pf_listing_id: Option<String>,
    #[serde(default)]
    pf_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pf_verification_status: Option<String>,
    #[serde(flatten)]
    attributes: PropertyAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentRecord {
    id: String,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    pf_agent_id: Option<String>,
    #[serde(default)]
    pf_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pf_verification_status: Option<String>,
    #[serde(flatten)]
    attributes: AgentAttributes,
}

fn default_active() -> bool {
    true
}

/// A record published before the import without `pfSyncedAt` is stamped with
/// the import time, the earliest moment this store knew it was on the portal.
fn portal_state(
    remote_id: Option<String>,
    synced_at: Option<DateTime<Utc>>,
    verification: Option<&str>,
    imported_at: DateTime<Utc>,
) -> RemoteSyncState {
    let remote_id = remote_id.filter(|id| !id.trim().is_empty());
    let synced_at = remote_id.as_ref().and(synced_at.or(Some(imported_at)));
    RemoteSyncState {
        remote_id,
        synced_at,
        verification: verification
            .and_then(VerificationStatus::parse)
            .unwrap_or_default(),
        ..Default::default()
    }
}

/// Parse an export document into entities, agents first
pub fn parse_import(json: &str) -> Result<Vec<SyncableEntity>> {
    parse_import_at(json, Utc::now())
}

fn parse_import_at(json: &str, imported_at: DateTime<Utc>) -> Result<Vec<SyncableEntity>> {
    let document: ImportDocument =
        serde_json::from_str(json).context("Import file is not a valid CRM export")?;

    let mut entities = Vec::with_capacity(document.agents.len() + document.properties.len());
    for record in document.agents {
        let state = portal_state(
            record.pf_agent_id,
            record.pf_synced_at,
            record.pf_verification_status.as_deref(),
            imported_at,
        );
        entities.push(
            SyncableEntity::agent(record.id, record.is_active, record.attributes)
                .with_sync_state(state),
        );
    }
    for record in document.properties {
        let state = portal_state(
            record.pf_listing_id,
            record.pf_synced_at,
            record.pf_verification_status.as_deref(),
            imported_at,
        );
        entities.push(
            SyncableEntity::property(record.id, record.is_active, record.attributes)
                .with_sync_state(state),
        );
    }

    if let Some(blank) = entities.iter().find(|e| e.id().trim().is_empty()) {
        anyhow::bail!("Import contains a {} without an id", blank.kind());
    }
    Ok(entities)
}
