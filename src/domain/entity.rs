use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local CRM identifier of a property or agent
pub type EntityId = String;

/// Identifier assigned by the listing portal
pub type RemoteId = String;

/// Which kind of CRM record an entity is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A property, published on the portal as a listing
    Property,
    /// An agent, published on the portal as a user profile
    Agent,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Property => "property",
            EntityKind::Agent => "agent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "property" | "listing" => Some(EntityKind::Property),
            "agent" | "user" => Some(EntityKind::Agent),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review state of a record on the portal side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// Parse a status string as the portal reports it.
    ///
    /// The portal is not consistent about wording, so a few synonyms are
    /// accepted (`verified` means approved, `in_review` means pending).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "unverified" | "not_verified" | "none" => Some(VerificationStatus::Unverified),
            "pending" | "in_review" | "submitted" => Some(VerificationStatus::Pending),
            "approved" | "verified" => Some(VerificationStatus::Approved),
            "rejected" | "declined" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Property attributes as the CRM stores them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAttributes {
    pub title: Option<String>,
    pub description: Option<String>,
    /// CRM reference number shown to clients (falls back to the local id)
    pub reference: Option<String>,
    /// e.g. "apartment", "villa"
    pub property_type: Option<String>,
    /// "sale" or "rent"
    pub offering_type: Option<String>,
    pub price: Option<f64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub size_sqft: Option<f64>,
    /// Portal location tree id (`pfLocationId` in the CRM)
    pub location_id: Option<String>,
    pub furnishing: Option<String>,
    /// RERA / DLD permit number
    pub permit_number: Option<String>,
    /// Portal id of the assigned agent, when that agent is already published
    pub agent_remote_id: Option<RemoteId>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Agent attributes as the CRM stores them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAttributes {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub license_number: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Domain payload of a syncable entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityPayload {
    Property(PropertyAttributes),
    Agent(AgentAttributes),
}

impl EntityPayload {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPayload::Property(_) => EntityKind::Property,
            EntityPayload::Agent(_) => EntityKind::Agent,
        }
    }
}

/// Portal-side status of an entity as last observed by the reconciler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSyncState {
    /// `pfListingId` / `pfAgentId`
    pub remote_id: Option<RemoteId>,
    /// `pfSyncedAt`: last successful sync
    pub synced_at: Option<DateTime<Utc>>,
    /// `pfVerificationStatus`
    pub verification: VerificationStatus,
    /// Digest of the payload the portal last accepted
    pub synced_digest: Option<String>,
    /// Set when the portal record was deactivated, cleared on re-publish
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl RemoteSyncState {
    /// Drop field combinations that cannot exist: a sync timestamp, digest or
    /// review status without a remote identity.
    fn normalized(mut self) -> Self {
        if self.remote_id.is_none() {
            self.synced_at = None;
            self.verification = VerificationStatus::Unverified;
            self.synced_digest = None;
            self.deactivated_at = None;
        } else if self.synced_at.is_none() {
            // Callers that know when the record became known pass that time;
            // this only covers state built without one.
            self.synced_at = Some(Utc::now());
        }
        self
    }

    /// `synced_at` is set iff `remote_id` is, and review status stays
    /// unverified until the portal knows the record.
    pub fn is_consistent(&self) -> bool {
        let identity_matches = self.remote_id.is_some() == self.synced_at.is_some();
        let review_matches =
            self.remote_id.is_some() || self.verification == VerificationStatus::Unverified;
        identity_matches && review_matches
    }
}

/// A local property or agent that may have a portal counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncableEntity {
    id: EntityId,
    /// Local intent: whether the entity should be published
    pub is_active: bool,
    pub payload: EntityPayload,
    #[serde(default)]
    sync: RemoteSyncState,
}

impl SyncableEntity {
    /// A new entity that has never been sent to the portal
    pub fn new(id: impl Into<EntityId>, is_active: bool, payload: EntityPayload) -> Self {
        Self {
            id: id.into(),
            is_active,
            payload,
            sync: RemoteSyncState::default(),
        }
    }

    pub fn property(id: impl Into<EntityId>, is_active: bool, attrs: PropertyAttributes) -> Self {
        Self::new(id, is_active, EntityPayload::Property(attrs))
    }

    pub fn agent(id: impl Into<EntityId>, is_active: bool, attrs: AgentAttributes) -> Self {
        Self::new(id, is_active, EntityPayload::Agent(attrs))
    }

    /// Attach previously persisted portal state (used when loading from the store)
    pub fn with_sync_state(mut self, state: RemoteSyncState) -> Self {
        self.sync = state.normalized();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.sync.remote_id.as_deref()
    }

    pub fn remote_synced_at(&self) -> Option<DateTime<Utc>> {
        self.sync.synced_at
    }

    pub fn verification(&self) -> VerificationStatus {
        self.sync.verification
    }

    pub fn sync_state(&self) -> &RemoteSyncState {
        &self.sync
    }

    /// True when the portal already holds exactly this payload and the record is live
    pub(crate) fn is_in_sync(&self, digest: &str) -> bool {
        self.sync.remote_id.is_some()
            && self.sync.deactivated_at.is_none()
            && self.sync.synced_digest.as_deref() == Some(digest)
    }

    pub(crate) fn is_deactivated(&self) -> bool {
        self.sync.deactivated_at.is_some()
    }

    pub(crate) fn mark_created(
        &mut self,
        remote_id: RemoteId,
        now: DateTime<Utc>,
        digest: String,
        verification: Option<VerificationStatus>,
    ) {
        self.sync.remote_id = Some(remote_id);
        self.sync.synced_at = Some(now);
        self.sync.synced_digest = Some(digest);
        self.sync.deactivated_at = None;
        // A brand new portal record has no review history of its own.
        self.sync.verification = verification.unwrap_or(VerificationStatus::Unverified);
    }

    pub(crate) fn mark_updated(
        &mut self,
        now: DateTime<Utc>,
        digest: String,
        verification: Option<VerificationStatus>,
    ) {
        self.sync.synced_at = Some(now);
        self.sync.synced_digest = Some(digest);
        self.sync.deactivated_at = None;
        if let Some(status) = verification {
            self.sync.verification = status;
        }
    }

    /// Remote id is kept so that re-activation updates instead of re-creating.
    pub(crate) fn mark_deactivated(&mut self, now: DateTime<Utc>) {
        self.sync.synced_at = Some(now);
        self.sync.verification = VerificationStatus::Unverified;
        self.sync.deactivated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed() -> SyncableEntity {
        SyncableEntity::property("p-1", true, PropertyAttributes::default())
    }

    #[test]
    fn test_restored_state_is_normalized() {
        let entity = listed().with_sync_state(RemoteSyncState {
            remote_id: None,
            synced_at: Some(Utc::now()),
            verification: VerificationStatus::Approved,
            synced_digest: Some("abc".to_string()),
            deactivated_at: None,
        });

        assert!(entity.remote_synced_at().is_none());
        assert_eq!(entity.verification(), VerificationStatus::Unverified);
        assert!(entity.sync_state().is_consistent());
    }

    #[test]
    fn test_deactivation_keeps_remote_id() {
        let mut entity = listed();
        entity.mark_created(
            "PF-9".to_string(),
            Utc::now(),
            "d1".to_string(),
            Some(VerificationStatus::Approved),
        );
        entity.mark_deactivated(Utc::now());

        assert_eq!(entity.remote_id(), Some("PF-9"));
        assert_eq!(entity.verification(), VerificationStatus::Unverified);
        assert!(entity.is_deactivated());
        assert!(!entity.is_in_sync("d1"));
        assert!(entity.sync_state().is_consistent());
    }

    #[test]
    fn test_update_keeps_status_when_portal_is_silent() {
        let mut entity = listed();
        entity.mark_created(
            "PF-1".to_string(),
            Utc::now(),
            "d1".to_string(),
            Some(VerificationStatus::Pending),
        );
        entity.mark_updated(Utc::now(), "d2".to_string(), None);

        assert_eq!(entity.verification(), VerificationStatus::Pending);
        assert!(entity.is_in_sync("d2"));
    }

    #[test]
    fn test_status_synonyms() {
        assert_eq!(
            VerificationStatus::parse("Verified"),
            Some(VerificationStatus::Approved)
        );
        assert_eq!(
            VerificationStatus::parse("in-review"),
            Some(VerificationStatus::Pending)
        );
        assert_eq!(VerificationStatus::parse("archived"), None);
    }
}
