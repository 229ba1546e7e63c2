//! Import command: load a CRM export into the local store

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use portal_sync::config::Config;
use portal_sync::store::parse_import;
use portal_sync::EntityKind;

use super::open_store;

pub fn import_command(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let store = open_store(&config)?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;
    let entities = parse_import(&content)
        .with_context(|| format!("Failed to parse import file: {}", file.display()))?;

    for entity in &entities {
        store.upsert_entity(entity)?;
    }

    let agents = entities
        .iter()
        .filter(|e| e.kind() == EntityKind::Agent)
        .count();
    info!("[portal-sync:import] Imported {} entities from {}", entities.len(), file.display());
    println!(
        "Imported {} agents and {} properties.",
        agents,
        entities.len() - agents
    );

    Ok(())
}
