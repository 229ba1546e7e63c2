//! Shared test utilities: scripted portal, in-memory store, fixtures

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use portal_sync::mapper::{AgentPayload, ListingPayload};
use portal_sync::remote::{AccessToken, RemoteAck, RemoteError, RemotePortal};
use portal_sync::store::EntityStore;
use portal_sync::{
    AgentAttributes, EntityKind, PropertyAttributes, RemoteSyncState, SyncRun, SyncableEntity,
    VerificationStatus,
};

/// A portal call as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate,
    /// Keyed by payload reference (the local id in these fixtures)
    CreateListing(String),
    UpdateListing(String),
    DeactivateListing(String),
    CreateAgent(String),
    UpdateAgent(String),
    DeactivateAgent(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Authenticate)
    }
}

/// In-memory portal with scripted failures.
///
/// Records are keyed by remote id (`PF-1`, `PF-2`, ...). Failures are keyed by
/// payload reference for creates and by remote id for updates/deactivations.
#[derive(Default)]
pub struct MockPortal {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    /// remote id -> live
    records: Mutex<HashMap<String, bool>>,
    failures: Mutex<HashMap<String, RemoteError>>,
    auth_failure: Mutex<Option<RemoteError>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockPortal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutation takes `delay`, to observe concurrency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every call touching `key` fail with `err`
    pub fn fail_on(&self, key: &str, err: RemoteError) {
        self.failures.lock().unwrap().insert(key.to_string(), err);
    }

    pub fn fail_authentication(&self, err: RemoteError) {
        *self.auth_failure.lock().unwrap() = Some(err);
    }

    /// A record that exists on the portal before the test starts
    pub fn seed_record(&self, remote_id: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(remote_id.to_string(), true);
    }

    /// Simulate an out-of-band deletion on the portal
    pub fn remove_record(&self, remote_id: &str) {
        self.records.lock().unwrap().remove(remote_id);
    }

    pub fn is_live(&self, remote_id: &str) -> Option<bool> {
        self.records.lock().unwrap().get(remote_id).copied()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn scripted(&self, key: &str) -> Option<RemoteError> {
        self.failures.lock().unwrap().get(key).cloned()
    }

    async fn busy(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn create(&self, call: Call, reference: &str) -> Result<RemoteAck, RemoteError> {
        self.log(call);
        self.busy().await;
        if let Some(err) = self.scripted(reference) {
            return Err(err);
        }
        let remote_id = format!("PF-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.records.lock().unwrap().insert(remote_id.clone(), true);
        Ok(RemoteAck {
            remote_id,
            verification: None,
        })
    }

    async fn update(&self, call: Call, remote_id: &str) -> Result<RemoteAck, RemoteError> {
        self.log(call);
        self.busy().await;
        if let Some(err) = self.scripted(remote_id) {
            return Err(err);
        }
        let mut records = self.records.lock().unwrap();
        match records.get_mut(remote_id) {
            Some(live) => {
                *live = true;
                Ok(RemoteAck {
                    remote_id: remote_id.to_string(),
                    verification: Some(VerificationStatus::Pending),
                })
            }
            None => Err(RemoteError::NotFound {
                remote_id: remote_id.to_string(),
            }),
        }
    }

    async fn deactivate(&self, call: Call, remote_id: &str) -> Result<(), RemoteError> {
        self.log(call);
        self.busy().await;
        if let Some(err) = self.scripted(remote_id) {
            return Err(err);
        }
        // Already inactive or gone is fine.
        if let Some(live) = self.records.lock().unwrap().get_mut(remote_id) {
            *live = false;
        }
        Ok(())
    }
}

#[async_trait]
impl RemotePortal for MockPortal {
    async fn authenticate(&self) -> Result<AccessToken, RemoteError> {
        self.log(Call::Authenticate);
        match self.auth_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(AccessToken::expiring_in("mock-token", 3600)),
        }
    }

    async fn create_listing(&self, payload: &ListingPayload) -> Result<RemoteAck, RemoteError> {
        self.create(Call::CreateListing(payload.reference.clone()), &payload.reference)
            .await
    }

    async fn update_listing(
        &self,
        remote_id: &str,
        _payload: &ListingPayload,
    ) -> Result<RemoteAck, RemoteError> {
        self.update(Call::UpdateListing(remote_id.to_string()), remote_id)
            .await
    }

    async fn deactivate_listing(&self, remote_id: &str) -> Result<(), RemoteError> {
        self.deactivate(Call::DeactivateListing(remote_id.to_string()), remote_id)
            .await
    }

    async fn create_agent(&self, payload: &AgentPayload) -> Result<RemoteAck, RemoteError> {
        self.create(Call::CreateAgent(payload.reference.clone()), &payload.reference)
            .await
    }

    async fn update_agent(
        &self,
        remote_id: &str,
        _payload: &AgentPayload,
    ) -> Result<RemoteAck, RemoteError> {
        self.update(Call::UpdateAgent(remote_id.to_string()), remote_id)
            .await
    }

    async fn deactivate_agent(&self, remote_id: &str) -> Result<(), RemoteError> {
        self.deactivate(Call::DeactivateAgent(remote_id.to_string()), remote_id)
            .await
    }
}

/// Entity store backed by a `Vec`
#[derive(Default)]
pub struct MemoryStore {
    entities: Mutex<Vec<SyncableEntity>>,
    runs: Mutex<Vec<SyncRun>>,
    saves: AtomicUsize,
    broken: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn with(entities: Vec<SyncableEntity>) -> Arc<Self> {
        Arc::new(Self {
            entities: Mutex::new(entities),
            ..Default::default()
        })
    }

    /// Saving `id` fails from now on
    pub fn break_saves_for(&self, id: &str) {
        self.broken.lock().unwrap().insert(id.to_string());
    }

    pub fn get(&self, id: &str) -> SyncableEntity {
        self.entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id() == id)
            .cloned()
            .unwrap_or_else(|| panic!("no entity {}", id))
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl EntityStore for MemoryStore {
    fn load(&self, kind: EntityKind, ids: &[String]) -> anyhow::Result<Vec<SyncableEntity>> {
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind)
            .filter(|e| ids.is_empty() || ids.iter().any(|id| id == e.id()))
            .cloned()
            .collect())
    }

    fn save_sync_state(&self, entity: &SyncableEntity) -> anyhow::Result<()> {
        if self.broken.lock().unwrap().contains(entity.id()) {
            anyhow::bail!("disk full");
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut entities = self.entities.lock().unwrap();
        match entities.iter_mut().find(|e| e.id() == entity.id()) {
            Some(stored) => *stored = entity.clone(),
            None => entities.push(entity.clone()),
        }
        Ok(())
    }

    fn record_run(&self, run: &SyncRun) -> anyhow::Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> anyhow::Result<Vec<SyncRun>> {
        Ok(self.runs().into_iter().rev().take(limit).collect())
    }
}

pub fn property_attrs(title: &str) -> PropertyAttributes {
    PropertyAttributes {
        title: Some(title.to_string()),
        description: Some("Bright unit with sea view".to_string()),
        property_type: Some("apartment".to_string()),
        offering_type: Some("sale".to_string()),
        price: Some(1_200_000.0),
        bedrooms: Some(2),
        bathrooms: Some(2),
        size_sqft: Some(1_150.0),
        location_id: Some("50".to_string()),
        ..Default::default()
    }
}

/// A mappable, active property that was never published
pub fn new_property(id: &str) -> SyncableEntity {
    SyncableEntity::property(id, true, property_attrs(&format!("Listing {}", id)))
}

/// A mappable, active agent that was never published
pub fn new_agent(id: &str) -> SyncableEntity {
    SyncableEntity::agent(
        id,
        true,
        AgentAttributes {
            first_name: Some("Sara".to_string()),
            last_name: Some("Haddad".to_string()),
            email: Some(format!("{}@agency.test", id)),
            phone: Some("+971500000000".to_string()),
            ..Default::default()
        },
    )
}

/// `entity` as already published under `remote_id`, with no known digest
pub fn published(entity: SyncableEntity, remote_id: &str) -> SyncableEntity {
    entity.with_sync_state(RemoteSyncState {
        remote_id: Some(remote_id.to_string()),
        synced_at: Some(Utc::now()),
        verification: VerificationStatus::Approved,
        ..Default::default()
    })
}

pub fn inactive(mut entity: SyncableEntity) -> SyncableEntity {
    entity.is_active = false;
    entity
}
