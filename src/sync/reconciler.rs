//! Batch reconciliation of local entities against the portal

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{SyncError, SyncRunTracker};
use crate::domain::{EntityKind, ItemResult, SyncAction, SyncRun, SyncableEntity};
use crate::mapper::{RemotePayload, to_remote_payload};
use crate::remote::{RemoteAck, RemoteError, RemotePortal};
use crate::store::EntityStore;

/// Per-run switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Send updates (and repeat deactivations) even when nothing changed
    pub force: bool,
}

/// Drives one sync run: map, call the portal, persist, record.
pub struct Reconciler {
    portal: Arc<dyn RemotePortal>,
    store: Arc<dyn EntityStore>,
    workers: usize,
}

impl Reconciler {
    pub fn new(portal: Arc<dyn RemotePortal>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            portal,
            store,
            workers: 1,
        }
    }

    /// Entities processed in parallel; 1 is strictly sequential
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Reconcile `entities` with the portal.
    ///
    /// Per-entity failures end up in the returned run. Only failing to
    /// authenticate (before or during the run) is returned as an error; state
    /// persisted for entities finished before that point is kept.
    pub async fn run_sync(
        &self,
        entities: &mut [SyncableEntity],
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncRun, SyncError> {
        let total = entities.len();
        let tracker = SyncRunTracker::start(total);

        if cancel.is_cancelled() {
            info!("[portal-sync:sync] Run cancelled before it started");
            return Ok(tracker.finish(true));
        }
        if total == 0 {
            return Ok(tracker.finish(false));
        }

        self.portal
            .authenticate()
            .await
            .map_err(SyncError::Authentication)?;

        // Cancelled by the caller or by a mid-run authentication failure.
        let stop = cancel.child_token();
        let fatal: Mutex<Option<RemoteError>> = Mutex::new(None);

        {
            let tracker = &tracker;
            let stop = &stop;
            let fatal = &fatal;

            stream::iter(entities.iter_mut())
                .map(|entity| async move {
                    if stop.is_cancelled() {
                        return;
                    }
                    match self.reconcile_entity(entity, options).await {
                        Ok(item) => tracker.record(item),
                        Err(err) => {
                            error!(
                                "[portal-sync:sync] Authentication lost while syncing {} {}: {}",
                                entity.kind(),
                                entity.id(),
                                err
                            );
                            fatal
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .get_or_insert(err);
                            stop.cancel();
                        }
                    }
                })
                .buffer_unordered(self.workers)
                .collect::<Vec<()>>()
                .await;
        }

        if let Some(err) = fatal.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(SyncError::Authentication(err));
        }

        let cancelled = tracker.processed() < total;
        let run = tracker.finish(cancelled);
        info!(
            "[portal-sync:sync] Run {} finished: {} succeeded ({} unchanged), {} failed of {}{}",
            run.id,
            run.succeeded,
            run.skipped(),
            run.failed,
            run.total,
            if run.cancelled { " (cancelled)" } else { "" }
        );
        Ok(run)
    }

    /// Bring one entity in line with the portal.
    ///
    /// `Err` is reserved for authentication failures, which end the run.
    async fn reconcile_entity(
        &self,
        entity: &mut SyncableEntity,
        options: &RunOptions,
    ) -> Result<ItemResult, RemoteError> {
        let id = entity.id().to_string();
        let kind = entity.kind();

        if !entity.is_active {
            let Some(remote_id) = entity.remote_id().map(str::to_string) else {
                debug!("[portal-sync:sync] {} {} inactive and never published", kind, id);
                return Ok(ItemResult::success(id, kind, SyncAction::Skip, None));
            };
            if entity.is_deactivated() && !options.force {
                return Ok(ItemResult::success(id, kind, SyncAction::Skip, Some(remote_id)));
            }

            return match self.deactivate(kind, &remote_id).await {
                Ok(()) => {
                    entity.mark_deactivated(Utc::now());
                    info!("[portal-sync:sync] Deactivated {} {} ({})", kind, id, remote_id);
                    Ok(self.persist(
                        entity,
                        ItemResult::success(id, kind, SyncAction::Deactivate, Some(remote_id)),
                    ).await)
                }
                Err(err) => failed(entity, SyncAction::Deactivate, err),
            };
        }

        let intended = if entity.remote_id().is_some() {
            SyncAction::Update
        } else {
            SyncAction::Create
        };
        let mapped = match to_remote_payload(entity) {
            Ok(mapped) => mapped,
            Err(err) => {
                warn!("[portal-sync:sync] {}", err);
                return Ok(ItemResult::failure(id, kind, intended, err.to_string()));
            }
        };
        for warning in &mapped.warnings {
            debug!(
                "[portal-sync:sync] {} {}: {} defaulted ({})",
                kind, id, warning.field, warning.message
            );
        }

        let payload = mapped.payload;
        let digest = payload.digest();

        let Some(remote_id) = entity.remote_id().map(str::to_string) else {
            return match self.create(&payload).await {
                Ok(ack) => {
                    info!("[portal-sync:sync] Created {} {} as {}", kind, id, ack.remote_id);
                    let remote_id = ack.remote_id.clone();
                    entity.mark_created(ack.remote_id, Utc::now(), digest, ack.verification);
                    Ok(self.persist(
                        entity,
                        ItemResult::success(id, kind, SyncAction::Create, Some(remote_id)),
                    ).await)
                }
                Err(err) => failed(entity, SyncAction::Create, err),
            };
        };

        if entity.is_in_sync(&digest) && !options.force {
            return Ok(ItemResult::success(id, kind, SyncAction::Skip, Some(remote_id)));
        }

        match self.update(&remote_id, &payload).await {
            Ok(ack) => {
                debug!("[portal-sync:sync] Updated {} {} ({})", kind, id, remote_id);
                entity.mark_updated(Utc::now(), digest, ack.verification);
                Ok(self.persist(
                    entity,
                    ItemResult::success(id, kind, SyncAction::Update, Some(remote_id)),
                ).await)
            }
            Err(RemoteError::NotFound { .. }) => {
                warn!(
                    "[portal-sync:sync] {} {} missing on the portal ({}), creating it again",
                    kind, id, remote_id
                );
                match self.create(&payload).await {
                    Ok(ack) => {
                        let new_id = ack.remote_id.clone();
                        entity.mark_created(ack.remote_id, Utc::now(), digest, ack.verification);
                        Ok(self.persist(
                            entity,
                            ItemResult::success(id, kind, SyncAction::Recreate, Some(new_id)),
                        ).await)
                    }
                    Err(err) if err.is_authentication() => Err(err),
                    // Any failure of the fallback leaves the record unpublishable as is.
                    Err(err) => failed(
                        entity,
                        SyncAction::Recreate,
                        RemoteError::Validation {
                            status: match &err {
                                RemoteError::Validation { status, .. } => *status,
                                _ => 404,
                            },
                            detail: format!(
                                "portal record {} is gone and recreating it failed: {}",
                                remote_id, err
                            ),
                        },
                    ),
                }
            }
            Err(err) => failed(entity, SyncAction::Update, err),
        }
    }

    async fn create(&self, payload: &RemotePayload) -> Result<RemoteAck, RemoteError> {
        match payload {
            RemotePayload::Listing(listing) => self.portal.create_listing(listing).await,
            RemotePayload::Agent(agent) => self.portal.create_agent(agent).await,
        }
    }

    async fn update(
        &self,
        remote_id: &str,
        payload: &RemotePayload,
    ) -> Result<RemoteAck, RemoteError> {
        match payload {
            RemotePayload::Listing(listing) => self.portal.update_listing(remote_id, listing).await,
            RemotePayload::Agent(agent) => self.portal.update_agent(remote_id, agent).await,
        }
    }

    async fn deactivate(&self, kind: EntityKind, remote_id: &str) -> Result<(), RemoteError> {
        match kind {
            EntityKind::Property => self.portal.deactivate_listing(remote_id).await,
            EntityKind::Agent => self.portal.deactivate_agent(remote_id).await,
        }
    }

    /// Write the entity's new portal state; a store failure turns the item
    /// into a failure since the next run would repeat the portal call.
    ///
    /// SQLite calls block, so they run on the blocking pool.
    async fn persist(&self, entity: &SyncableEntity, item: ItemResult) -> ItemResult {
        let store = self.store.clone();
        let snapshot = entity.clone();
        let saved = tokio::task::spawn_blocking(move || store.save_sync_state(&snapshot))
            .await
            .unwrap_or_else(|e| Err(anyhow::anyhow!("save task failed: {}", e)));

        match saved {
            Ok(()) => item,
            Err(err) => {
                error!(
                    "[portal-sync:sync] Failed to save sync state of {} {}: {:#}",
                    entity.kind(),
                    entity.id(),
                    err
                );
                ItemResult::failure(
                    entity.id(),
                    entity.kind(),
                    item.action,
                    format!("portal accepted the change but saving it locally failed: {:#}", err),
                )
            }
        }
    }
}

/// Record a per-entity failure, or hand back a run-fatal one
fn failed(
    entity: &SyncableEntity,
    action: SyncAction,
    err: RemoteError,
) -> Result<ItemResult, RemoteError> {
    if err.is_authentication() {
        return Err(err);
    }
    warn!(
        "[portal-sync:sync] {} of {} {} failed: {}",
        action,
        entity.kind(),
        entity.id(),
        err
    );
    Ok(ItemResult::failure(
        entity.id(),
        entity.kind(),
        action,
        err.to_string(),
    ))
}
