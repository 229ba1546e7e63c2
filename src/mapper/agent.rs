//! Agent → portal user profile

use serde::Serialize;

use super::{FieldViolation, MappingWarning, non_blank, require_text};
use crate::domain::AgentAttributes;

/// User body accepted by the portal's create/update user endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPayload {
    /// Local agent id, echoed back by the portal as the external reference
    pub reference: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Optional on the portal side; blank is sent as ""
    pub bio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
}

pub(super) fn map_agent(
    entity_id: &str,
    attrs: &AgentAttributes,
    violations: &mut Vec<FieldViolation>,
    warnings: &mut Vec<MappingWarning>,
) -> Option<AgentPayload> {
    let first_name = require_text(&attrs.first_name, "firstName", violations);
    let last_name = require_text(&attrs.last_name, "lastName", violations);

    let email = match non_blank(&attrs.email) {
        Some(email) if looks_like_email(&email) => Some(email.to_ascii_lowercase()),
        Some(email) => {
            violations.push(FieldViolation::invalid(
                "email",
                format!("{:?} is not an email address", email),
            ));
            None
        }
        None => {
            violations.push(FieldViolation::missing("email"));
            None
        }
    };

    let phone = require_text(&attrs.phone, "phone", violations);

    let bio = match non_blank(&attrs.bio) {
        Some(bio) => bio,
        None => {
            warnings.push(MappingWarning {
                field: "bio",
                message: "blank bio sent as empty text".to_string(),
            });
            String::new()
        }
    };

    Some(AgentPayload {
        reference: entity_id.to_string(),
        first_name: first_name?,
        last_name: last_name?,
        email: email?,
        phone: phone?,
        bio,
        photo_url: non_blank(&attrs.photo_url),
        license_number: non_blank(&attrs.license_number),
        position: non_blank(&attrs.position),
        languages: attrs
            .languages
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
    })
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_email_and_phone() {
        let attrs = AgentAttributes {
            first_name: Some("Omar".to_string()),
            last_name: Some("Saleh".to_string()),
            bio: Some("Ten years in Dubai Marina".to_string()),
            ..Default::default()
        };
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        assert!(map_agent("a-2", &attrs, &mut violations, &mut warnings).is_none());

        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["email", "phone"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_malformed_email() {
        assert!(looks_like_email("agent@broker.ae"));
        assert!(!looks_like_email("agent.broker.ae"));
        assert!(!looks_like_email("@broker.ae"));
        assert!(!looks_like_email("agent@broker."));
    }
}
