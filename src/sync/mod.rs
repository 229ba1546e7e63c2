//! Sync engine: reconciler, run tracking and the service entry point

mod reconciler;
mod tracker;

pub use reconciler::{Reconciler, RunOptions};
pub use tracker::SyncRunTracker;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SyncSettings;
use crate::domain::SyncRun;
use crate::remote::{RemoteError, RemotePortal};
use crate::store::{EntityFilter, EntityStore};

/// Conditions that stop a run as a whole
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{0}")]
    Authentication(RemoteError),

    #[error("local store error: {0:#}")]
    Store(anyhow::Error),
}

/// A triggered run: which entities, and whether to force resends
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncRequest {
    pub entity_type: EntityFilter,
    /// Restrict the run to these local ids
    pub ids: Vec<String>,
    pub force: bool,
}

/// Loads entities, reconciles them and keeps the run log
pub struct SyncService {
    reconciler: Reconciler,
    store: Arc<dyn EntityStore>,
    agents_first: bool,
}

impl SyncService {
    pub fn new(
        portal: Arc<dyn RemotePortal>,
        store: Arc<dyn EntityStore>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(portal, store.clone()).with_workers(settings.workers),
            store,
            agents_first: settings.agents_first,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub async fn run(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncRun, SyncError> {
        let ids = unique_ids(&request.ids);
        let mut entities = Vec::new();
        for kind in request.entity_type.kinds(self.agents_first) {
            let loaded = self.store.load(kind, &ids).map_err(SyncError::Store)?;
            entities.extend(loaded);
        }
        // One portal record per local entity: a second copy would create again.
        let mut seen = HashSet::new();
        entities.retain(|e| seen.insert((e.kind(), e.id().to_string())));

        info!(
            "[portal-sync:sync] Syncing {} entities ({:?}, {} worker(s){})",
            entities.len(),
            request.entity_type,
            self.reconciler.workers(),
            if request.force { ", forced" } else { "" }
        );

        let options = RunOptions {
            force: request.force,
        };
        let run = self
            .reconciler
            .run_sync(&mut entities, &options, cancel)
            .await?;

        if let Err(err) = self.store.record_run(&run) {
            warn!("[portal-sync:sync] Failed to record run {}: {:#}", run.id, err);
        }
        Ok(run)
    }
}

/// `ids` without repeats, first occurrence wins
fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_keeps_first_order() {
        let ids: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_ids(&ids), vec!["b", "a", "c"]);
    }
}
