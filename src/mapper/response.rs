//! Portal response → local status fields

use serde_json::Value;

use crate::domain::{RemoteId, VerificationStatus};

const ID_KEYS: &[&str] = &["id", "listingId", "userId", "publicProfileId"];
const STATUS_KEYS: &[&str] = &["verificationStatus", "verification_status"];

/// Status fields the CRM tracks for a portal record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteStatusFields {
    pub remote_id: Option<RemoteId>,
    pub verification: Option<VerificationStatus>,
}

/// Extract the tracked fields from a portal response body.
///
/// Bodies may come wrapped in a `data` envelope. Ids may be strings or
/// numbers. Anything else in the body is ignored.
pub fn from_remote_response(response: &Value) -> RemoteStatusFields {
    let body = match response.get("data") {
        Some(inner @ Value::Object(_)) => inner,
        _ => response,
    };

    let remote_id = ID_KEYS
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(id_to_string);

    let verification = STATUS_KEYS
        .iter()
        .filter_map(|key| body.get(*key))
        .chain(body.get("verification").and_then(|v| v.get("status")))
        .filter_map(Value::as_str)
        .find_map(VerificationStatus::parse);

    RemoteStatusFields {
        remote_id,
        verification,
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
