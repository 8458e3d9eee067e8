//! Snapshot document parsing and the per-item merge loop.
//!
//! A snapshot is one JSON document holding a `configurationItems` array.
//! Items are merged one at a time; a damaged item is logged with its
//! payload and skipped, never blocking the rest of the document.

use serde::Deserialize;
use serde_json::Value;

use confgraph_core::normalize_item;
use confgraph_graph::MergeEngine;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct SnapshotDocument {
    #[serde(rename = "configurationItems", default)]
    configuration_items: Vec<Value>,
}

/// Counters reported by every collector at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectStats {
    /// Listed entries examined (object-store keys, files, identifiers).
    pub scanned: u64,
    /// Entries that passed all filters and were fetched.
    pub matched: u64,
    /// Configuration items merged into the graph.
    pub merged: u64,
    /// Items that failed normalization or merge and were skipped.
    pub failed_items: u64,
    /// Objects/files that failed to fetch or decode and were skipped.
    pub failed_objects: u64,
}

/// Parse one snapshot document into its raw configuration items.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Vec<Value>> {
    let document: SnapshotDocument = serde_json::from_slice(bytes)?;
    Ok(document.configuration_items)
}

/// Merge a batch of raw items, isolating per-item failures.
pub async fn merge_items(engine: &MergeEngine, items: Vec<Value>, stats: &mut CollectStats) {
    for item in items {
        match merge_item(engine, item.clone()).await {
            Ok(()) => stats.merged += 1,
            Err(e) => {
                stats.failed_items += 1;
                tracing::error!(error = %e, item = %item, "Failed to merge configuration item");
            }
        }
    }
}

/// Merge a single raw item: normalize, then apply node and edge upserts.
pub async fn merge_item(engine: &MergeEngine, item: Value) -> Result<()> {
    let record = normalize_item(item)?;
    engine.merge_record(&record).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_snapshot_document() {
        let doc = json!({
            "fileVersion": "1.0",
            "configurationItems": [
                {"resourceId": "a", "resourceType": "AWS::S3::Bucket"},
                {"resourceId": "b", "resourceType": "AWS::EC2::Instance"}
            ]
        });
        let items = parse_snapshot(doc.to_string().as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parse_snapshot_without_items() {
        let items = parse_snapshot(br#"{"fileVersion": "1.0"}"#).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_snapshot_rejects_garbage() {
        assert!(parse_snapshot(b"not json").is_err());
    }
}
