//! SQLite connection and schema management for the CRM store
//!
//! Manages `~/.portal-sync/crm.db` with automatic schema migration.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::domain::EntityKind;

/// Shared database handle
#[derive(Clone)]
pub struct CrmDb {
    conn: Arc<Mutex<Connection>>,
}

impl CrmDb {
    /// Open or create the database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store dir: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store db: {}", path.display()))?;

        // WAL so `status` can read while `serve` is writing
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to create store schema")?;
        drop(conn);
        self.run_migrations()
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(0);

        // Migration 2: track portal-side deactivation separately from sync time
        if version < 2 {
            for table in ["properties", "agents"] {
                if !has_column(&conn, table, "pf_deactivated_at") {
                    conn.execute_batch(&format!(
                        "ALTER TABLE {} ADD COLUMN pf_deactivated_at TEXT;",
                        table
                    ))?;
                }
            }
            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        Ok(())
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
    conn.prepare(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?1",
        table
    ))
    .and_then(|mut s| s.query_row([column], |r| r.get::<_, i32>(0)))
    .map(|c| c > 0)
    .unwrap_or(false)
}

/// Table and remote id column for an entity kind
pub(crate) fn table_for(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::Property => ("properties", "pf_listing_id"),
        EntityKind::Agent => ("agents", "pf_agent_id"),
    }
}

/// SQL schema for the CRM store (version 1; later columns come from migrations)
const SCHEMA_SQL: &str = r#"
-- Properties, published on the portal as listings
CREATE TABLE IF NOT EXISTS properties (
    id TEXT PRIMARY KEY,
    is_active INTEGER NOT NULL DEFAULT 1,
    attributes TEXT NOT NULL DEFAULT '{}',
    pf_listing_id TEXT,
    pf_synced_at TEXT,
    pf_verification_status TEXT NOT NULL DEFAULT 'unverified',
    pf_synced_digest TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_properties_listing ON properties(pf_listing_id);

-- Agents, published on the portal as user profiles
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    is_active INTEGER NOT NULL DEFAULT 1,
    attributes TEXT NOT NULL DEFAULT '{}',
    pf_agent_id TEXT,
    pf_synced_at TEXT,
    pf_verification_status TEXT NOT NULL DEFAULT 'unverified',
    pf_synced_digest TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agents_remote ON agents(pf_agent_id);

-- One row per reconciliation run
CREATE TABLE IF NOT EXISTS sync_runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    total INTEGER NOT NULL DEFAULT 0,
    succeeded INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    cancelled INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_sync_runs_started ON sync_runs(started_at);

-- Per-entity results of a run
CREATE TABLE IF NOT EXISTS sync_run_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES sync_runs(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    entity_id TEXT NOT NULL,
    entity_kind TEXT NOT NULL,
    action TEXT NOT NULL,
    outcome TEXT NOT NULL,
    error_detail TEXT,
    remote_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_sync_run_items_run ON sync_run_items(run_id);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;
