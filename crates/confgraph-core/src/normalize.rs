//! Record normalization: raw configuration items into merge units.
//!
//! A raw item is one JSON object from a snapshot file or a discovery-API
//! response. Normalization decomposes it into one primary entity plus zero
//! or more related entities and relationship descriptors, stripping the
//! snapshot envelope metadata along the way.

use serde_json::{Map, Value};

use crate::error::NormalizeError;
use crate::types::{NormalizedRecord, PropertyMap, PropertyValue, RelationshipSpec, ResourceIdentity};

/// Field names carrying the identity of a resource.
const RESOURCE_ID_FIELD: &str = "resourceId";
const RESOURCE_TYPE_FIELD: &str = "resourceType";

/// Nested relationship list inside a configuration item.
const RELATIONSHIPS_FIELD: &str = "relationships";

/// Relationship name field; S3 snapshot documents use the legacy `name`.
const RELATIONSHIP_NAME_FIELD: &str = "relationshipName";
const LEGACY_RELATIONSHIP_NAME_FIELD: &str = "name";

/// Snapshot envelope metadata fields share this prefix and are excluded
/// from merged properties.
const ENVELOPE_PREFIX: &str = "configurationItem";

/// Fallback edge type used when a relationship entry names no relationship.
pub const UNKNOWN_RELATIONSHIP: &str = "unknown_relationship";

/// Decompose one raw configuration item.
///
/// Steps, in order: extract the identity, extract the relationship list
/// (defaulting to empty), strip envelope metadata, and convert the
/// remainder into the property map. Each relationship entry is normalized
/// the same way into a target identity, an edge-type token, and the
/// target's partial properties.
pub fn normalize_item(item: Value) -> Result<NormalizedRecord, NormalizeError> {
    let Value::Object(mut fields) = item else {
        return Err(NormalizeError::NotAnObject);
    };

    let identity = take_identity(&mut fields)?;

    let raw_relationships = match fields.remove(RELATIONSHIPS_FIELD) {
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(NormalizeError::InvalidRelationships),
        None => Vec::new(),
    };

    fields.retain(|key, _| !key.starts_with(ENVELOPE_PREFIX));

    let relationships = raw_relationships
        .into_iter()
        .map(normalize_relationship)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NormalizedRecord {
        identity,
        properties: to_property_map(fields),
        relationships,
    })
}

fn normalize_relationship(entry: Value) -> Result<RelationshipSpec, NormalizeError> {
    let Value::Object(mut fields) = entry else {
        return Err(NormalizeError::InvalidRelationshipEntry);
    };

    let target = take_identity(&mut fields)?;

    let label = take_string(&mut fields, RELATIONSHIP_NAME_FIELD)?
        .or(take_string(&mut fields, LEGACY_RELATIONSHIP_NAME_FIELD)?)
        .map(|name| normalize_relationship_label(&name))
        .unwrap_or_else(|| UNKNOWN_RELATIONSHIP.to_string());

    Ok(RelationshipSpec {
        target,
        label,
        target_properties: to_property_map(fields),
    })
}

/// Replace embedded whitespace with underscores so the name forms a valid
/// edge-type token.
pub fn normalize_relationship_label(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn take_identity(fields: &mut Map<String, Value>) -> Result<ResourceIdentity, NormalizeError> {
    let resource_id = take_string(fields, RESOURCE_ID_FIELD)?
        .ok_or(NormalizeError::MissingField(RESOURCE_ID_FIELD))?;
    let resource_type = take_string(fields, RESOURCE_TYPE_FIELD)?
        .ok_or(NormalizeError::MissingField(RESOURCE_TYPE_FIELD))?;
    Ok(ResourceIdentity::new(resource_id, resource_type))
}

fn take_string(
    fields: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, NormalizeError> {
    match fields.remove(key) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(NormalizeError::NotAString(key)),
        None => Ok(None),
    }
}

fn to_property_map(fields: Map<String, Value>) -> PropertyMap {
    fields
        .into_iter()
        .filter_map(|(key, value)| PropertyValue::from_json(value).map(|v| (key, v)))
        .collect()
}
