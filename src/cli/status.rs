//! Status command implementation

use anyhow::Result;
use std::path::Path;

use portal_sync::config::Config;
use portal_sync::store::EntityStore;

use super::{open_store, print_run};

/// Show entity counts and the most recent sync runs
pub fn status_command(config_path: Option<&Path>, limit: usize) -> Result<()> {
    let config = Config::load(config_path)?;
    let store = open_store(&config)?;

    println!("Store: {}\n", config.store_path().display());
    for summary in store.summary()? {
        println!(
            "  {:<9} {} total, {} active, {} published, {} deactivated",
            summary.kind.to_string(),
            summary.total,
            summary.active,
            summary.published,
            summary.deactivated
        );
    }

    let runs = store.recent_runs(limit)?;
    if runs.is_empty() {
        println!("\nNo sync runs recorded.");
        return Ok(());
    }

    println!("\nRecent runs ({}):\n", runs.len());
    for run in &runs {
        print_run(run);
    }

    Ok(())
}
