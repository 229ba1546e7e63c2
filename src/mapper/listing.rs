//! Property → portal listing

use serde::Serialize;

use super::{FieldViolation, MappingWarning, non_blank, require_text};
use crate::domain::PropertyAttributes;

const OFFERING_TYPES: &[&str] = &["sale", "rent"];

/// Listing body accepted by the portal's create/update listing endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    pub reference: String,
    pub title: String,
    pub description: String,
    pub offering_type: String,
    pub property_type: String,
    pub price: f64,
    pub location_id: String,
    pub size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub furnishing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

pub(super) fn map_property(
    entity_id: &str,
    attrs: &PropertyAttributes,
    violations: &mut Vec<FieldViolation>,
    warnings: &mut Vec<MappingWarning>,
) -> Option<ListingPayload> {
    let title = require_text(&attrs.title, "title", violations);
    let property_type = require_text(&attrs.property_type, "propertyType", violations);

    let offering_type = match non_blank(&attrs.offering_type).map(|s| s.to_ascii_lowercase()) {
        Some(kind) if OFFERING_TYPES.contains(&kind.as_str()) => Some(kind),
        Some(kind) => {
            violations.push(FieldViolation::invalid(
                "offeringType",
                format!("must be one of {:?}, got {:?}", OFFERING_TYPES, kind),
            ));
            None
        }
        None => {
            violations.push(FieldViolation::missing("offeringType"));
            None
        }
    };

    let price = positive(attrs.price, "price", violations);
    let location_id = require_text(&attrs.location_id, "locationId", violations);
    let size = positive(attrs.size_sqft, "sizeSqft", violations);

    let description = match non_blank(&attrs.description) {
        Some(text) => text,
        None => {
            warnings.push(MappingWarning {
                field: "description",
                message: "blank description sent as empty text".to_string(),
            });
            String::new()
        }
    };

    let reference = non_blank(&attrs.reference).unwrap_or_else(|| entity_id.to_string());

    Some(ListingPayload {
        reference,
        title: title?,
        description,
        offering_type: offering_type?,
        property_type: property_type?,
        price: price?,
        location_id: location_id?,
        size: size?,
        bedrooms: attrs.bedrooms,
        bathrooms: attrs.bathrooms,
        furnishing: non_blank(&attrs.furnishing),
        permit_number: non_blank(&attrs.permit_number),
        assigned_agent_id: non_blank(&attrs.agent_remote_id),
        amenities: clean_list(&attrs.amenities),
        images: clean_list(&attrs.images),
    })
}

fn positive(
    value: Option<f64>,
    field: &'static str,
    violations: &mut Vec<FieldViolation>,
) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Some(v),
        Some(v) => {
            violations.push(FieldViolation::invalid(
                field,
                format!("must be a positive number, got {}", v),
            ));
            None
        }
        None => {
            violations.push(FieldViolation::missing(field));
            None
        }
    }
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_missing_field_is_listed() {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        let payload = map_property(
            "p-7",
            &PropertyAttributes::default(),
            &mut violations,
            &mut warnings,
        );

        assert!(payload.is_none());
        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(
            fields,
            vec![
                "title",
                "propertyType",
                "offeringType",
                "price",
                "locationId",
                "sizeSqft"
            ]
        );
    }

    #[test]
    fn test_rejects_unknown_offering_and_zero_price() {
        let attrs = PropertyAttributes {
            title: Some("Studio".to_string()),
            property_type: Some("apartment".to_string()),
            offering_type: Some("lease".to_string()),
            price: Some(0.0),
            location_id: Some("12".to_string()),
            size_sqft: Some(410.0),
            ..Default::default()
        };
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        assert!(map_property("p-8", &attrs, &mut violations, &mut warnings).is_none());

        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["offeringType", "price"]);
    }

    #[test]
    fn test_reference_falls_back_to_local_id() {
        let attrs = PropertyAttributes {
            title: Some("Townhouse".to_string()),
            property_type: Some("townhouse".to_string()),
            offering_type: Some("Rent".to_string()),
            price: Some(180_000.0),
            location_id: Some("77".to_string()),
            size_sqft: Some(2_400.0),
            amenities: vec![" pool ".to_string(), String::new()],
            ..Default::default()
        };
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        let listing = map_property("p-9", &attrs, &mut violations, &mut warnings).unwrap();

        assert_eq!(listing.reference, "p-9");
        assert_eq!(listing.offering_type, "rent");
        assert_eq!(listing.amenities, vec!["pool".to_string()]);
        assert_eq!(warnings.len(), 1);
    }
}
