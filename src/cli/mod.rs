//! CLI command implementations

pub mod import;
pub mod init;
pub mod run;
pub mod serve;
pub mod status;

use anyhow::Result;

use portal_sync::config::Config;
use portal_sync::store::{CrmDb, SqliteStore};
use portal_sync::SyncRun;

/// Open the SQLite store configured in `config`
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    let db = CrmDb::open(&config.store_path())?;
    Ok(SqliteStore::new(db))
}

/// Print a run summary followed by its failures
pub fn print_run(run: &SyncRun) {
    let finished = run
        .finished_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Run {} ({}): {} total, {} succeeded ({} unchanged), {} failed{}",
        run.id,
        finished,
        run.total,
        run.succeeded,
        run.skipped(),
        run.failed,
        if run.cancelled { ", cancelled" } else { "" }
    );

    for item in run.failures() {
        println!(
            "  x {} {} [{}]: {}",
            item.entity_kind,
            item.entity_id,
            item.action,
            item.error_detail.as_deref().unwrap_or("unknown error")
        );
    }
}
