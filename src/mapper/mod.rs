//! Field mapping between CRM entities and portal payloads
//!
//! Everything here is pure: no I/O, no clock, no shared state. The reconciler
//! maps an entity before any network call, so an entity that cannot be
//! expressed in the portal schema never reaches the portal.
//!
//! Required fields are checked exhaustively. A [`MappingError`] lists every
//! violation of an entity at once so an operator can fix the record in one go.

mod agent;
mod listing;
mod response;

pub use agent::AgentPayload;
pub use listing::ListingPayload;
pub use response::{RemoteStatusFields, from_remote_response};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{EntityId, EntityPayload, SyncableEntity};

/// Request body for the portal, one variant per entity kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RemotePayload {
    Listing(ListingPayload),
    Agent(AgentPayload),
}

impl RemotePayload {
    /// Content digest used to detect whether the portal already holds this payload
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }
}

/// One required field that is missing or unusable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self {
            field,
            message: "required by the portal but missing".to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A documented optional field that was filled with its default
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingWarning {
    pub field: &'static str,
    pub message: String,
}

/// Entity cannot be converted into a valid portal payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity_id} cannot be mapped ({}): {}", .violations.len(), join_violations(.violations))]
pub struct MappingError {
    pub entity_id: EntityId,
    pub violations: Vec<FieldViolation>,
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validated payload plus the defaults that were applied to build it
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMappingResult {
    pub payload: RemotePayload,
    pub warnings: Vec<MappingWarning>,
}

/// Convert a local entity into the payload the portal expects
pub fn to_remote_payload(entity: &SyncableEntity) -> Result<RemoteMappingResult, MappingError> {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    let payload = match &entity.payload {
        EntityPayload::Property(attrs) => {
            listing::map_property(entity.id(), attrs, &mut violations, &mut warnings)
                .map(RemotePayload::Listing)
        }
        EntityPayload::Agent(attrs) => {
            agent::map_agent(entity.id(), attrs, &mut violations, &mut warnings)
                .map(RemotePayload::Agent)
        }
    };

    match payload {
        Some(payload) if violations.is_empty() => Ok(RemoteMappingResult { payload, warnings }),
        _ => Err(MappingError {
            entity_id: entity.id().to_string(),
            violations,
        }),
    }
}

/// Trimmed, non-empty text or `None`
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Required text field; records a violation when absent
pub(crate) fn require_text(
    value: &Option<String>,
    field: &'static str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    let text = non_blank(value);
    if text.is_none() {
        violations.push(FieldViolation::missing(field));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentAttributes, PropertyAttributes};

    fn complete_property() -> PropertyAttributes {
        PropertyAttributes {
            title: Some("Marina view 2BR".to_string()),
            description: Some("High floor, sea view".to_string()),
            reference: Some("CRM-0042".to_string()),
            property_type: Some("apartment".to_string()),
            offering_type: Some("sale".to_string()),
            price: Some(2_150_000.0),
            bedrooms: Some(2),
            bathrooms: Some(3),
            size_sqft: Some(1_320.0),
            location_id: Some("5002".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_two_missing_fields_are_both_reported() {
        let mut attrs = complete_property();
        attrs.title = None;
        attrs.location_id = Some("   ".to_string());
        let entity = SyncableEntity::property("p-1", true, attrs);

        let err = to_remote_payload(&entity).unwrap_err();
        let fields: Vec<_> = err.violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["title", "locationId"]);
        assert!(err.to_string().contains("(2)"));
    }

    #[test]
    fn test_complete_property_maps_without_warnings() {
        let entity = SyncableEntity::property("p-1", true, complete_property());
        let result = to_remote_payload(&entity).unwrap();

        assert!(result.warnings.is_empty());
        let RemotePayload::Listing(listing) = result.payload else {
            panic!("expected a listing payload");
        };
        assert_eq!(listing.reference, "CRM-0042");
        assert_eq!(listing.price, 2_150_000.0);
    }

    #[test]
    fn test_blank_bio_defaults_to_empty_string() {
        let attrs = AgentAttributes {
            first_name: Some("Lina".to_string()),
            last_name: Some("Haddad".to_string()),
            email: Some("lina@example.com".to_string()),
            phone: Some("+971500000001".to_string()),
            bio: Some("  ".to_string()),
            ..Default::default()
        };
        let entity = SyncableEntity::agent("a-1", true, attrs);
        let result = to_remote_payload(&entity).unwrap();

        let RemotePayload::Agent(agent) = &result.payload else {
            panic!("expected an agent payload");
        };
        assert_eq!(agent.bio, "");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "bio");
    }

    #[test]
    fn test_digest_tracks_content() {
        let entity = SyncableEntity::property("p-1", true, complete_property());
        let first = to_remote_payload(&entity).unwrap().payload.digest();
        let again = to_remote_payload(&entity).unwrap().payload.digest();
        assert_eq!(first, again);

        let mut changed = complete_property();
        changed.price = Some(2_000_000.0);
        let changed = SyncableEntity::property("p-1", true, changed);
        assert_ne!(first, to_remote_payload(&changed).unwrap().payload.digest());
    }
}
