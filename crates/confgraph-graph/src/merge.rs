//! Idempotent merge operations against the knowledge graph.
//!
//! All mutations use MERGE (upsert) semantics so re-ingesting the same
//! record reaches the same graph state. Nodes are identified by
//! (label, resourceId); edges by the (source, type, target) triple. Each
//! statement is independent; the engine holds no cross-record memory.

use neo4rs::{query, Query};

use confgraph_core::types::{NormalizedRecord, PropertyMap, PropertyValue, ResourceIdentity};

use crate::client::{GraphClient, GraphError};
use crate::registry::{is_valid_identifier, TypeRegistry, IDENTITY_PROPERTY};

/// The single mutation point for the graph.
pub struct MergeEngine {
    graph: GraphClient,
    registry: TypeRegistry,
}

impl MergeEngine {
    pub fn new(graph: GraphClient) -> Self {
        Self {
            graph,
            registry: TypeRegistry::new(),
        }
    }

    pub fn graph(&self) -> &GraphClient {
        &self.graph
    }

    /// Merge one normalized record: the primary node first, then for each
    /// relationship the target node (with whatever partial properties are
    /// known) before the edge itself, so edges never dangle.
    pub async fn merge_record(&self, record: &NormalizedRecord) -> Result<(), GraphError> {
        self.merge_node(&record.identity, &record.properties).await?;

        for rel in &record.relationships {
            self.merge_node(&rel.target, &rel.target_properties).await?;
            self.merge_relationship(&record.identity, &rel.target, &rel.label)
                .await?;
        }

        Ok(())
    }

    /// Upsert a node by identity.
    ///
    /// On create, all given properties are set; on match, the same set is
    /// overwritten (last write wins per property). Properties absent from
    /// this record are left untouched. An empty map merges the bare node
    /// with no SET clauses.
    pub async fn merge_node(
        &self,
        identity: &ResourceIdentity,
        properties: &PropertyMap,
    ) -> Result<(), GraphError> {
        let label = self
            .registry
            .ensure_label(&self.graph, &identity.resource_type)
            .await?;

        let cypher = node_merge_cypher(&label, properties)?;
        let mut q = query(&cypher).param("resource_id", identity.resource_id.as_str());
        q = bind_properties(q, properties);

        self.graph.run(q).await?;

        tracing::debug!(
            identity = %identity,
            properties = properties.len(),
            "Merged node"
        );
        Ok(())
    }

    /// Upsert a directed edge between two already-merged nodes.
    ///
    /// Both endpoints are matched, never created here. A merge that finds
    /// no endpoint pair is surfaced as [`GraphError::DanglingEdge`] rather
    /// than silently matching nothing.
    pub async fn merge_relationship(
        &self,
        source: &ResourceIdentity,
        target: &ResourceIdentity,
        label: &str,
    ) -> Result<(), GraphError> {
        if !is_valid_identifier(label) {
            return Err(GraphError::InvalidToken {
                kind: "relationship type",
                token: label.to_string(),
            });
        }

        let src_label = self
            .registry
            .ensure_label(&self.graph, &source.resource_type)
            .await?;
        let dst_label = self
            .registry
            .ensure_label(&self.graph, &target.resource_type)
            .await?;

        let cypher = relationship_merge_cypher(&src_label, &dst_label, label);
        let q = query(&cypher)
            .param("source_id", source.resource_id.as_str())
            .param("target_id", target.resource_id.as_str());

        let merged = match self.graph.query_one(q).await? {
            Some(row) => row.get::<i64>("merged").unwrap_or(0),
            None => 0,
        };

        if merged == 0 {
            return Err(GraphError::DanglingEdge {
                source_id: source.to_string(),
                target_id: target.to_string(),
                label: label.to_string(),
            });
        }

        tracing::debug!(source = %source, target = %target, label = %label, "Merged relationship");
        Ok(())
    }
}

/// Build the MERGE statement for one node.
///
/// Property names become statement text, so each is validated; values are
/// referenced through positional parameters (`$p0..$pN`) and bound
/// separately. When the map is empty the SET clauses are omitted entirely.
fn node_merge_cypher(label: &str, properties: &PropertyMap) -> Result<String, GraphError> {
    let mut cypher = format!("MERGE (n:{label} {{{IDENTITY_PROPERTY}: $resource_id}})\n");

    if !properties.is_empty() {
        for name in properties.keys() {
            if !is_valid_identifier(name) {
                return Err(GraphError::InvalidToken {
                    kind: "property name",
                    token: name.clone(),
                });
            }
        }

        let assignments = properties
            .keys()
            .enumerate()
            .map(|(i, name)| format!("    n.{name} = $p{i}"))
            .collect::<Vec<_>>()
            .join(",\n");

        cypher.push_str("ON CREATE SET\n");
        cypher.push_str(&assignments);
        cypher.push_str("\nON MATCH SET\n");
        cypher.push_str(&assignments);
        cypher.push('\n');
    }

    cypher.push_str("RETURN n");
    Ok(cypher)
}

/// Build the MERGE statement for one edge. `RETURN count(r)` lets the
/// caller distinguish a merged edge from a MATCH that found no endpoints.
fn relationship_merge_cypher(src_label: &str, dst_label: &str, rel_type: &str) -> String {
    format!(
        "MATCH (a:{src_label} {{{IDENTITY_PROPERTY}: $source_id}}), \
               (b:{dst_label} {{{IDENTITY_PROPERTY}: $target_id}})\n\
         MERGE (a)-[r:{rel_type}]->(b)\n\
         RETURN count(r) AS merged"
    )
}

/// Bind property values as parameters in map order, matching the `$pN`
/// placeholders emitted by [`node_merge_cypher`].
fn bind_properties(mut q: Query, properties: &PropertyMap) -> Query {
    for (i, value) in properties.values().enumerate() {
        let name = format!("p{i}");
        q = match value {
            PropertyValue::Bool(b) => q.param(&name, *b),
            PropertyValue::Int(n) => q.param(&name, *n),
            PropertyValue::Float(f) => q.param(&name, *f),
            PropertyValue::Text(s) => q.param(&name, s.as_str()),
            PropertyValue::Json(s) => q.param(&name, s.as_str()),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, PropertyValue)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_node_cypher_with_properties() {
        let properties = props(&[
            ("awsRegion", PropertyValue::Text("us-east-1".into())),
            ("configuration", PropertyValue::Json("{}".into())),
        ]);
        let cypher = node_merge_cypher("AWSEC2Instance", &properties).unwrap();

        assert!(cypher.starts_with("MERGE (n:AWSEC2Instance {resourceId: $resource_id})"));
        assert!(cypher.contains("ON CREATE SET"));
        assert!(cypher.contains("ON MATCH SET"));
        // BTreeMap order: awsRegion before configuration.
        assert!(cypher.contains("n.awsRegion = $p0"));
        assert!(cypher.contains("n.configuration = $p1"));
        assert!(cypher.ends_with("RETURN n"));
    }

    #[test]
    fn test_node_cypher_empty_properties_has_no_set() {
        let cypher = node_merge_cypher("AWSS3Bucket", &PropertyMap::new()).unwrap();
        assert_eq!(
            cypher,
            "MERGE (n:AWSS3Bucket {resourceId: $resource_id})\nRETURN n"
        );
        assert!(!cypher.contains("SET"));
    }

    #[test]
    fn test_node_cypher_rejects_bad_property_name() {
        let properties = props(&[("aws region", PropertyValue::Text("x".into()))]);
        let err = node_merge_cypher("AWSS3Bucket", &properties).unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidToken {
                kind: "property name",
                ..
            }
        ));
    }

    #[test]
    fn test_dangling_edge_error_carries_both_endpoints() {
        let err = GraphError::DanglingEdge {
            source_id: "ConfTest::Net::Route/rt-1".to_string(),
            target_id: "ConfTest::Net::Gateway/gw-1".to_string(),
            label: "Routes_to_Gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "relationship Routes_to_Gateway from ConfTest::Net::Route/rt-1 \
             to ConfTest::Net::Gateway/gw-1 matched no endpoint nodes"
        );
        // The endpoint ids are plain data, not a wrapped error cause.
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_relationship_cypher_shape() {
        let cypher =
            relationship_merge_cypher("AWSEC2Instance", "AWSEC2Volume", "Is_attached_to_Volume");
        assert!(cypher.contains("MATCH (a:AWSEC2Instance {resourceId: $source_id})"));
        assert!(cypher.contains("(b:AWSEC2Volume {resourceId: $target_id})"));
        assert!(cypher.contains("MERGE (a)-[r:Is_attached_to_Volume]->(b)"));
        assert!(cypher.contains("RETURN count(r) AS merged"));
    }
}
