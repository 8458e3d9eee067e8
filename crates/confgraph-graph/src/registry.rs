//! Type registry: resource-type labels and their uniqueness constraints.
//!
//! Labels and property names are interpolated into Cypher statement text
//! (Neo4j does not parameterize them), so every token is validated against
//! a strict identifier shape first. Property values are never interpolated;
//! they are always bound parameters.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use neo4rs::query;

use confgraph_core::types::TYPE_SEPARATOR;

use crate::client::{GraphClient, GraphError};

/// The identity property every node label is constrained on.
pub const IDENTITY_PROPERTY: &str = "resourceId";

/// Server error codes that mean the constraint is already in place.
/// Creating a constraint that exists is success, not an error.
const ALREADY_EXISTS_CODES: &[&str] = &[
    "Neo.ClientError.Schema.EquivalentSchemaRuleAlreadyExists",
    "Neo.ClientError.Schema.ConstraintAlreadyExists",
    "Neo.ClientError.Schema.IndexAlreadyExists",
];

/// Derive the graph label for a resource type by removing the hierarchy
/// separator: `AWS::EC2::Instance` becomes `AWSEC2Instance`.
pub fn resource_label(resource_type: &str) -> String {
    resource_type.split(TYPE_SEPARATOR).collect()
}

/// A node label must be a non-empty alphanumeric token.
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Property names and relationship types must look like identifiers:
/// leading letter or underscore, then letters, digits, or underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Tracks which labels have had their uniqueness constraint ensured during
/// this process lifetime, so the schema statement is issued once per label.
#[derive(Default)]
pub struct TypeRegistry {
    ensured: Mutex<HashSet<String>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a resource type into its graph label, creating the
    /// uniqueness constraint on (label, resourceId) on first use.
    ///
    /// An "already exists" response from the server is success. Any other
    /// schema error is propagated; nothing retries it.
    pub async fn ensure_label(
        &self,
        graph: &GraphClient,
        resource_type: &str,
    ) -> Result<String, GraphError> {
        let label = resource_label(resource_type);
        if !is_valid_label(&label) {
            return Err(GraphError::InvalidToken {
                kind: "label",
                token: label,
            });
        }

        if self.contains(&label) {
            return Ok(label);
        }

        create_identity_constraint(graph, &label).await?;
        self.insert(&label);
        Ok(label)
    }

    fn contains(&self, label: &str) -> bool {
        self.ensured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(label)
    }

    fn insert(&self, label: &str) {
        self.ensured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.to_string());
    }
}

/// Issue the uniqueness-constraint statement for one label.
///
/// The label has been validated by the caller; the constraint name is
/// derived from it and the fixed identity property.
pub async fn create_identity_constraint(
    graph: &GraphClient,
    label: &str,
) -> Result<(), GraphError> {
    let constraint_name = format!("constraint_unique_{label}_{IDENTITY_PROPERTY}");
    let cypher = format!(
        "CREATE CONSTRAINT {constraint_name}
         FOR (n:{label}) REQUIRE n.{IDENTITY_PROPERTY} IS UNIQUE"
    );

    match graph.run(query(&cypher)).await {
        Ok(()) => {
            tracing::debug!(label = %label, "Created uniqueness constraint");
            Ok(())
        }
        Err(GraphError::Query(e)) if constraint_already_exists(&e) => {
            tracing::debug!(label = %label, "Uniqueness constraint already exists");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// neo4rs surfaces the server error code in the error's Display output.
fn constraint_already_exists(e: &neo4rs::Error) -> bool {
    let message = e.to_string();
    ALREADY_EXISTS_CODES
        .iter()
        .any(|code| message.contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_label() {
        assert_eq!(resource_label("AWS::EC2::Instance"), "AWSEC2Instance");
        assert_eq!(resource_label("AWS::S3::Bucket"), "AWSS3Bucket");
        assert_eq!(resource_label("Custom"), "Custom");
    }

    #[test]
    fn test_label_validation() {
        assert!(is_valid_label("AWSEC2Instance"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("AWS EC2"));
        assert!(!is_valid_label("AWS-EC2"));
        assert!(!is_valid_label("n) DETACH DELETE (m"));
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("awsRegion"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("Is_attached_to_Volume"));
        assert!(is_valid_identifier("unknown_relationship"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("0leading"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("a.b"));
    }
}
