//! Sync run audit log

use anyhow::{Context, Result};
use rusqlite::Connection;
use uuid::Uuid;

use super::entities::parse_timestamp;
use crate::domain::{EntityKind, ItemOutcome, ItemResult, SyncAction, SyncRun};

/// Write a run and its items in one transaction. Re-recording a run replaces it.
pub(crate) fn insert_run(conn: &Connection, run: &SyncRun) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    let run_id = run.id.to_string();

    tx.execute(
        r#"INSERT OR REPLACE INTO sync_runs
           (id, started_at, finished_at, total, succeeded, failed, cancelled)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        rusqlite::params![
            run_id,
            run.started_at.to_rfc3339(),
            run.finished_at.map(|t| t.to_rfc3339()),
            run.total as i64,
            run.succeeded as i64,
            run.failed as i64,
            run.cancelled,
        ],
    )?;
    tx.execute("DELETE FROM sync_run_items WHERE run_id = ?1", [&run_id])?;

    {
        let mut stmt = tx.prepare(
            r#"INSERT INTO sync_run_items
               (run_id, position, entity_id, entity_kind, action, outcome, error_detail, remote_id)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )?;
        for (position, item) in run.items.iter().enumerate() {
            stmt.execute(rusqlite::params![
                run_id,
                position as i64,
                item.entity_id,
                item.entity_kind.as_str(),
                item.action.as_str(),
                item.outcome.as_str(),
                item.error_detail,
                item.remote_id,
            ])?;
        }
    }

    tx.commit()
        .with_context(|| format!("Failed to record sync run {}", run.id))?;
    Ok(())
}

struct RunRow {
    id: String,
    started_at: String,
    finished_at: Option<String>,
    total: i64,
    succeeded: i64,
    failed: i64,
    cancelled: bool,
}

pub(crate) fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<SyncRun>> {
    let mut stmt = conn.prepare(
        r#"SELECT id, started_at, finished_at, total, succeeded, failed, cancelled
           FROM sync_runs ORDER BY started_at DESC LIMIT ?1"#,
    )?;
    let rows = stmt
        .query_map([limit as i64], |r| {
            Ok(RunRow {
                id: r.get(0)?,
                started_at: r.get(1)?,
                finished_at: r.get(2)?,
                total: r.get(3)?,
                succeeded: r.get(4)?,
                failed: r.get(5)?,
                cancelled: r.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut runs = Vec::with_capacity(rows.len());
    for row in rows {
        let items = run_items(conn, &row.id)?;
        let started_at = parse_timestamp(Some(&row.started_at))?
            .with_context(|| format!("Run {} has no start time", row.id))?;
        runs.push(SyncRun {
            id: Uuid::parse_str(&row.id)
                .with_context(|| format!("Invalid run id in store: {}", row.id))?,
            started_at,
            finished_at: parse_timestamp(row.finished_at.as_deref())?,
            total: row.total.max(0) as usize,
            succeeded: row.succeeded.max(0) as usize,
            failed: row.failed.max(0) as usize,
            cancelled: row.cancelled,
            items,
        });
    }
    Ok(runs)
}

fn run_items(conn: &Connection, run_id: &str) -> Result<Vec<ItemResult>> {
    let mut stmt = conn.prepare(
        r#"SELECT entity_id, entity_kind, action, outcome, error_detail, remote_id
           FROM sync_run_items WHERE run_id = ?1 ORDER BY position"#,
    )?;
    let rows = stmt
        .query_map([run_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, Option<String>>(4)?,
                r.get::<_, Option<String>>(5)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(entity_id, kind, action, outcome, error_detail, remote_id)| {
            Ok(ItemResult {
                entity_kind: EntityKind::parse(&kind)
                    .with_context(|| format!("Unknown entity kind in run log: {}", kind))?,
                action: SyncAction::parse(&action)
                    .with_context(|| format!("Unknown action in run log: {}", action))?,
                outcome: ItemOutcome::parse(&outcome)
                    .with_context(|| format!("Unknown outcome in run log: {}", outcome))?,
                entity_id,
                error_detail,
                remote_id,
            })
        })
        .collect()
}
