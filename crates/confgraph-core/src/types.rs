//! Core domain types for the confgraph knowledge graph.
//!
//! Resource types and their property schemas are not known at compile time,
//! so records are modeled as a generic property mapping over a small closed
//! value variant rather than one struct per resource type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between segments of a hierarchical resource-type identifier
/// (e.g. `AWS::EC2::Instance`).
pub const TYPE_SEPARATOR: &str = "::";

/// The composite key identifying one resource within the graph.
///
/// `resource_id` is unique per `resource_type`, not globally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub resource_id: String,
    pub resource_type: String,
}

impl ResourceIdentity {
    pub fn new(resource_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
        }
    }

    /// The graph label for this identity's resource type: the hierarchy
    /// separator is removed, collapsing the type to a single token
    /// (`AWS::EC2::Instance` becomes `AWSEC2Instance`).
    pub fn label(&self) -> String {
        self.resource_type.split(TYPE_SEPARATOR).collect()
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

/// A single property cell.
///
/// Every cell is a scalar: composite JSON values (arrays, maps) are carried
/// only in their string-serialized form and are never deserialized again by
/// the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// String-serialized composite value.
    Json(String),
}

impl PropertyValue {
    /// Convert a JSON value into a property cell.
    ///
    /// Returns `None` for JSON `null`: a null property is dropped rather
    /// than bound, since setting a null would clear the stored property on
    /// re-merge.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Some(Self::Float(f))
                } else {
                    Some(Self::Json(n.to_string()))
                }
            }
            Value::String(s) => Some(Self::Text(s)),
            composite @ (Value::Array(_) | Value::Object(_)) => Some(Self::Json(
                serde_json::to_string(&composite).unwrap_or_default(),
            )),
        }
    }
}

/// Properties of one node, keyed by property name.
///
/// `BTreeMap` keeps iteration (and therefore statement parameter order)
/// deterministic across merges of the same record.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// One declared relationship, extracted from a configuration item.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipSpec {
    /// Identity of the related resource.
    pub target: ResourceIdentity,
    /// Edge-type token; whitespace already normalized to underscores.
    pub label: String,
    /// Partial properties of the target, possibly empty. The target may be
    /// known only by identity at this point.
    pub target_properties: PropertyMap,
}

/// The normalized form of one configuration item: exactly one primary node
/// plus zero or more related nodes and edges.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub identity: ResourceIdentity,
    pub properties: PropertyMap,
    pub relationships: Vec<RelationshipSpec>,
}
