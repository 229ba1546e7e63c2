//! Run command: one sync run from the command line

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use portal_sync::config::Config;
use portal_sync::remote::PortalClient;
use portal_sync::store::EntityFilter;
use portal_sync::sync::{SyncRequest, SyncService};

use super::{open_store, print_run};

/// CLI settings that can override config.toml values
#[derive(Debug, Default)]
pub struct RunSettings {
    pub entity_type: EntityFilter,
    pub ids: Vec<String>,
    pub force: bool,
    /// Worker count (overrides `[sync] workers` if Some)
    pub concurrency: Option<usize>,
}

pub async fn run_command(config_path: Option<&Path>, settings: RunSettings) -> Result<()> {
    let config = Config::load(config_path)?;
    config.ensure_valid()?;

    let mut sync_settings = config.sync.clone();
    if let Some(workers) = settings.concurrency {
        sync_settings.workers = workers;
    }

    let store = Arc::new(open_store(&config)?);
    let portal = Arc::new(PortalClient::new(config.portal.clone()));
    let service = SyncService::new(portal, store, &sync_settings);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("[portal-sync:sync] Interrupted, finishing in-flight entities");
                cancel.cancel();
            }
        })
    };

    let request = SyncRequest {
        entity_type: settings.entity_type,
        ids: settings.ids,
        force: settings.force,
    };
    let outcome = service.run(&request, &cancel).await;
    interrupt.abort();

    let run = outcome.context("Sync run aborted")?;
    print_run(&run);
    Ok(())
}
