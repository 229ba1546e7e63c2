//! Entity rows: loading, importing and writing back portal state

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::db::{CrmDb, table_for};
use super::{EntityStore, runs};
use crate::domain::{
    EntityKind, EntityPayload, RemoteSyncState, SyncRun, SyncableEntity, VerificationStatus,
};

/// Per-kind counts shown by `portal-sync status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindSummary {
    pub kind: EntityKind,
    pub total: usize,
    pub active: usize,
    pub published: usize,
    pub deactivated: usize,
}

/// Raw column values of an entity row
struct EntityRow {
    id: String,
    is_active: bool,
    attributes: String,
    remote_id: Option<String>,
    synced_at: Option<String>,
    verification: String,
    synced_digest: Option<String>,
    deactivated_at: Option<String>,
}

/// [`EntityStore`] on the local SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    db: CrmDb,
}

impl SqliteStore {
    pub fn new(db: CrmDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &CrmDb {
        &self.db
    }

    /// Insert or replace an entity's local attributes.
    ///
    /// Portal columns are only written for new rows, so re-importing CRM data
    /// never forgets what was already published.
    pub fn upsert_entity(&self, entity: &SyncableEntity) -> Result<()> {
        let (table, remote_col) = table_for(entity.kind());
        let attributes = match &entity.payload {
            EntityPayload::Property(attrs) => serde_json::to_string(attrs)?,
            EntityPayload::Agent(attrs) => serde_json::to_string(attrs)?,
        };
        let state = entity.sync_state();
        let now = Utc::now().to_rfc3339();

        let conn = self.db.conn();
        conn.execute(
            &format!(
                r#"INSERT INTO {table}
                   (id, is_active, attributes, {remote_col}, pf_synced_at, pf_verification_status,
                    pf_synced_digest, pf_deactivated_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                   ON CONFLICT(id) DO UPDATE SET
                       is_active = excluded.is_active,
                       attributes = excluded.attributes,
                       updated_at = excluded.updated_at"#
            ),
            rusqlite::params![
                entity.id(),
                entity.is_active,
                attributes,
                state.remote_id,
                state.synced_at.map(|t| t.to_rfc3339()),
                state.verification.as_str(),
                state.synced_digest,
                state.deactivated_at.map(|t| t.to_rfc3339()),
                now,
            ],
        )
        .with_context(|| format!("Failed to import {} {}", entity.kind(), entity.id()))?;
        Ok(())
    }

    /// Look up a single entity
    pub fn get(&self, kind: EntityKind, id: &str) -> Result<Option<SyncableEntity>> {
        let conn = self.db.conn();
        let row = query_rows(&conn, kind, Some(id))?.into_iter().next();
        row.map(|row| to_entity(kind, row)).transpose()
    }

    /// Counts per kind for the status overview
    pub fn summary(&self) -> Result<Vec<KindSummary>> {
        let conn = self.db.conn();
        let mut summaries = Vec::new();
        for kind in [EntityKind::Agent, EntityKind::Property] {
            let (table, remote_col) = table_for(kind);
            let summary = conn.query_row(
                &format!(
                    r#"SELECT COUNT(*),
                              COALESCE(SUM(is_active), 0),
                              COALESCE(SUM(CASE WHEN {remote_col} IS NOT NULL AND pf_deactivated_at IS NULL THEN 1 ELSE 0 END), 0),
                              COALESCE(SUM(CASE WHEN pf_deactivated_at IS NOT NULL THEN 1 ELSE 0 END), 0)
                       FROM {table}"#
                ),
                [],
                |r| {
                    Ok(KindSummary {
                        kind,
                        total: r.get::<_, i64>(0)? as usize,
                        active: r.get::<_, i64>(1)? as usize,
                        published: r.get::<_, i64>(2)? as usize,
                        deactivated: r.get::<_, i64>(3)? as usize,
                    })
                },
            )?;
            summaries.push(summary);
        }
        Ok(summaries)
    }
}

impl EntityStore for SqliteStore {
    fn load(&self, kind: EntityKind, ids: &[String]) -> Result<Vec<SyncableEntity>> {
        let conn = self.db.conn();
        let rows = if ids.is_empty() {
            query_rows(&conn, kind, None)?
        } else {
            let mut seen = HashSet::new();
            let mut rows = Vec::with_capacity(ids.len());
            for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
                rows.extend(query_rows(&conn, kind, Some(id))?);
            }
            rows
        };
        drop(conn);

        rows.into_iter().map(|row| to_entity(kind, row)).collect()
    }

    fn save_sync_state(&self, entity: &SyncableEntity) -> Result<()> {
        let (table, remote_col) = table_for(entity.kind());
        let state = entity.sync_state();

        let conn = self.db.conn();
        let changed = conn
            .execute(
                &format!(
                    r#"UPDATE {table} SET
                           {remote_col} = ?2,
                           pf_synced_at = ?3,
                           pf_verification_status = ?4,
                           pf_synced_digest = ?5,
                           pf_deactivated_at = ?6
                       WHERE id = ?1"#
                ),
                rusqlite::params![
                    entity.id(),
                    state.remote_id,
                    state.synced_at.map(|t| t.to_rfc3339()),
                    state.verification.as_str(),
                    state.synced_digest,
                    state.deactivated_at.map(|t| t.to_rfc3339()),
                ],
            )
            .with_context(|| {
                format!("Failed to save sync state of {} {}", entity.kind(), entity.id())
            })?;

        if changed == 0 {
            anyhow::bail!("{} {} no longer exists in the store", entity.kind(), entity.id());
        }
        Ok(())
    }

    fn record_run(&self, run: &SyncRun) -> Result<()> {
        let conn = self.db.conn();
        runs::insert_run(&conn, run)
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let conn = self.db.conn();
        runs::recent_runs(&conn, limit)
    }
}

fn query_rows(conn: &Connection, kind: EntityKind, id: Option<&str>) -> Result<Vec<EntityRow>> {
    let (table, remote_col) = table_for(kind);
    let select = format!(
        r#"SELECT id, is_active, attributes, {remote_col}, pf_synced_at, pf_verification_status,
                  pf_synced_digest, pf_deactivated_at
           FROM {table}"#
    );

    match id {
        Some(id) => {
            let row = conn
                .query_row(&format!("{select} WHERE id = ?1"), [id], entity_row)
                .optional()?;
            Ok(row.into_iter().collect())
        }
        None => {
            let mut stmt = conn.prepare(&format!("{select} ORDER BY id"))?;
            let rows = stmt
                .query_map([], entity_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        }
    }
}

fn entity_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    Ok(EntityRow {
        id: r.get(0)?,
        is_active: r.get(1)?,
        attributes: r.get(2)?,
        remote_id: r.get(3)?,
        synced_at: r.get(4)?,
        verification: r.get(5)?,
        synced_digest: r.get(6)?,
        deactivated_at: r.get(7)?,
    })
}

fn to_entity(kind: EntityKind, row: EntityRow) -> Result<SyncableEntity> {
    let payload = match kind {
        EntityKind::Property => EntityPayload::Property(
            serde_json::from_str(&row.attributes)
                .with_context(|| format!("Corrupt attributes for property {}", row.id))?,
        ),
        EntityKind::Agent => EntityPayload::Agent(
            serde_json::from_str(&row.attributes)
                .with_context(|| format!("Corrupt attributes for agent {}", row.id))?,
        ),
    };

    let state = RemoteSyncState {
        remote_id: row.remote_id.filter(|id| !id.trim().is_empty()),
        synced_at: parse_timestamp(row.synced_at.as_deref())?,
        verification: VerificationStatus::parse(&row.verification).unwrap_or_default(),
        synced_digest: row.synced_digest,
        deactivated_at: parse_timestamp(row.deactivated_at.as_deref())?,
    };

    Ok(SyncableEntity::new(row.id, row.is_active, payload).with_sync_state(state))
}

pub(crate) fn parse_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .with_context(|| format!("Invalid timestamp in store: {}", raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentAttributes, PropertyAttributes};
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempdir().unwrap();
        let db = CrmDb::open(&dir.path().join("crm.db")).unwrap();
        (dir, SqliteStore::new(db))
    }

    fn villa() -> SyncableEntity {
        SyncableEntity::property(
            "prop-1",
            true,
            PropertyAttributes {
                title: Some("Villa".to_string()),
                price: Some(1_250_000.0),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_import_then_load() {
        let (_dir, store) = store();
        store.upsert_entity(&villa()).unwrap();
        store
            .upsert_entity(&SyncableEntity::agent(
                "agent-1",
                false,
                AgentAttributes::default(),
            ))
            .unwrap();

        let properties = store.load(EntityKind::Property, &[]).unwrap();
        assert_eq!(properties, vec![villa()]);

        let agents = store.load(EntityKind::Agent, &[]).unwrap();
        assert_eq!(agents.len(), 1);
        assert!(!agents[0].is_active);
    }

    #[test]
    fn test_load_by_ids_skips_unknown() {
        let (_dir, store) = store();
        store.upsert_entity(&villa()).unwrap();

        let loaded = store
            .load(
                EntityKind::Property,
                &["missing".to_string(), "prop-1".to_string()],
            )
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), "prop-1");
    }

    #[test]
    fn test_load_repeated_id_once() {
        let (_dir, store) = store();
        store.upsert_entity(&villa()).unwrap();

        let ids = vec!["prop-1".to_string(), "prop-1".to_string()];
        let loaded = store.load(EntityKind::Property, &ids).unwrap();
        assert_eq!(loaded, vec![villa()]);
    }

    #[test]
    fn test_sync_state_round_trip_and_reimport_keeps_it() {
        let (_dir, store) = store();
        store.upsert_entity(&villa()).unwrap();

        let published = villa().with_sync_state(RemoteSyncState {
            remote_id: Some("PF-77".to_string()),
            synced_at: Some(Utc::now()),
            verification: VerificationStatus::Pending,
            synced_digest: Some("abc".to_string()),
            deactivated_at: None,
        });
        store.save_sync_state(&published).unwrap();

        // Re-importing the CRM row must not wipe the portal columns.
        let mut edited = villa();
        edited.is_active = false;
        store.upsert_entity(&edited).unwrap();

        let loaded = store.get(EntityKind::Property, "prop-1").unwrap().unwrap();
        assert!(!loaded.is_active);
        assert_eq!(loaded.remote_id(), Some("PF-77"));
        assert_eq!(loaded.verification(), VerificationStatus::Pending);
        assert_eq!(loaded.sync_state().synced_digest.as_deref(), Some("abc"));
    }

    #[test]
    fn test_save_unknown_entity_fails() {
        let (_dir, store) = store();
        assert!(store.save_sync_state(&villa()).is_err());
    }

    #[test]
    fn test_summary_counts() {
        let (_dir, store) = store();
        store.upsert_entity(&villa()).unwrap();
        store
            .upsert_entity(&SyncableEntity::property("prop-2", false, PropertyAttributes::default()))
            .unwrap();

        let summary = store.summary().unwrap();
        let properties = summary
            .iter()
            .find(|s| s.kind == EntityKind::Property)
            .unwrap();
        assert_eq!(properties.total, 2);
        assert_eq!(properties.active, 1);
        assert_eq!(properties.published, 0);
    }
}
