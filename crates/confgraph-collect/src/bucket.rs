//! Object-store collector: walk a bucket listing, fetch matching snapshot
//! objects, and merge their configuration items.
//!
//! Filters are applied per listed key in a fixed order: last-modified
//! threshold, storage-class allow-list (skips are logged, not errors), and
//! finally the key-name pattern. Listing failures abort the run; a single
//! object failing to fetch or decode is logged and skipped.

use std::io::Read;

use chrono::{DateTime, Duration, Utc};
use flate2::read::GzDecoder;
use regex::Regex;

use confgraph_graph::MergeEngine;

use crate::error::{CollectError, Result};
use crate::object_store::{ObjectInfo, ObjectStore};
use crate::snapshot::{merge_items, parse_snapshot, CollectStats};

/// Emit an operational warning after this many listed keys, as a signal of
/// pathological bucket sizes.
const SCAN_WARN_INTERVAL: u64 = 1_000_000;

/// The default last-modified lower bound: a fixed recent look-back window
/// ending now.
pub fn default_last_modified(lookback_hours: u64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(lookback_hours as i64)
}

/// Collector over one bucket/prefix of gzipped snapshot documents.
pub struct ObjectStoreCollector<S> {
    store: S,
    bucket: String,
    prefix: String,
    pattern: Regex,
    last_modified: DateTime<Utc>,
    storage_classes: Vec<String>,
}

impl<S: ObjectStore> ObjectStoreCollector<S> {
    pub fn new(
        store: S,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        pattern: &str,
        last_modified: DateTime<Utc>,
        storage_classes: Vec<String>,
    ) -> Result<Self> {
        // The pattern is matched from the start of the key, so `AWSLogs/...`
        // does not admit keys that merely contain `AWSLogs/` mid-key.
        let pattern = Regex::new(&format!(r"\A(?:{pattern})"))
            .map_err(|e| CollectError::Config(format!("invalid key pattern: {e}")))?;
        Ok(Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
            pattern,
            last_modified,
            storage_classes,
        })
    }

    /// Enumerate the bucket and merge every matching snapshot.
    pub async fn collect(&self, engine: &MergeEngine) -> Result<CollectStats> {
        let mut stats = CollectStats::default();
        let mut continuation: Option<String> = None;
        let mut scanned_since_warn = 0u64;

        loop {
            let page = self
                .store
                .list_page(&self.bucket, &self.prefix, continuation.as_deref())
                .await?;

            for object in &page.objects {
                stats.scanned += 1;
                scanned_since_warn += 1;

                if scanned_since_warn == SCAN_WARN_INTERVAL {
                    tracing::warn!(
                        scanned = stats.scanned,
                        bucket = %self.bucket,
                        "Listing scan still in progress; a bucket with this many keys \
                         will significantly delay ingestion. Consider a narrower prefix."
                    );
                    scanned_since_warn = 0;
                }

                if !self.passes_filters(object) {
                    continue;
                }
                stats.matched += 1;

                if let Err(e) = self.ingest_object(engine, object, &mut stats).await {
                    stats.failed_objects += 1;
                    tracing::warn!(key = %object.key, error = %e, "Skipping object");
                }
            }

            match page.next_token {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            scanned = stats.scanned,
            matched = stats.matched,
            merged = stats.merged,
            failed_items = stats.failed_items,
            failed_objects = stats.failed_objects,
            "Object-store collection complete"
        );
        Ok(stats)
    }

    fn passes_filters(&self, object: &ObjectInfo) -> bool {
        if object.last_modified < self.last_modified {
            return false;
        }

        if !self
            .storage_classes
            .iter()
            .any(|c| c == &object.storage_class)
        {
            tracing::info!(
                key = %object.key,
                storage_class = %object.storage_class,
                "Skipped key: storage class not in the allowed set"
            );
            return false;
        }

        self.pattern.is_match(&object.key)
    }

    async fn ingest_object(
        &self,
        engine: &MergeEngine,
        object: &ObjectInfo,
        stats: &mut CollectStats,
    ) -> Result<()> {
        let compressed = self.store.get_object(&self.bucket, &object.key).await?;

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut body = Vec::new();
        decoder
            .read_to_end(&mut body)
            .map_err(|e| CollectError::Decode(format!("gunzip {}: {e}", object.key)))?;

        let items = parse_snapshot(&body)?;
        tracing::debug!(key = %object.key, items = items.len(), "Parsed snapshot object");

        merge_items(engine, items, stats).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::ListPage;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct NullStore;

    #[async_trait]
    impl ObjectStore for NullStore {
        async fn list_page(
            &self,
            _bucket: &str,
            _prefix: &str,
            _continuation: Option<&str>,
        ) -> Result<ListPage> {
            Ok(ListPage {
                objects: Vec::new(),
                next_token: None,
            })
        }

        async fn get_object(&self, _bucket: &str, _key: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn object(key: &str, day: u32, storage_class: &str) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            storage_class: storage_class.to_string(),
            size: 1024,
        }
    }

    fn collector(last_modified_day: u32) -> ObjectStoreCollector<NullStore> {
        ObjectStoreCollector::new(
            NullStore,
            "config-snapshots",
            "AWSLogs/",
            r".*ConfigSnapshot.*\.json\.gz$",
            Utc.with_ymd_and_hms(2024, 5, last_modified_day, 0, 0, 0)
                .unwrap(),
            vec![
                "STANDARD".to_string(),
                "STANDARD_IA".to_string(),
                "REDUCED_REDUNDANCY".to_string(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_filters_yield_exact_ordered_subset() {
        let collector = collector(3);
        let listing = vec![
            object("AWSLogs/1/ConfigSnapshot-old.json.gz", 1, "STANDARD"),
            object("AWSLogs/1/ConfigSnapshot-a.json.gz", 4, "STANDARD"),
            object("AWSLogs/1/ConfigSnapshot-cold.json.gz", 4, "GLACIER"),
            object("AWSLogs/1/ConfigHistory-b.json.gz", 4, "STANDARD"),
            object("AWSLogs/1/ConfigSnapshot-c.json.gz", 5, "STANDARD_IA"),
        ];

        let matched: Vec<&str> = listing
            .iter()
            .filter(|o| collector.passes_filters(o))
            .map(|o| o.key.as_str())
            .collect();

        assert_eq!(
            matched,
            vec![
                "AWSLogs/1/ConfigSnapshot-a.json.gz",
                "AWSLogs/1/ConfigSnapshot-c.json.gz",
            ]
        );
    }

    #[test]
    fn test_last_modified_threshold_is_inclusive() {
        let collector = collector(4);
        let at_threshold = ObjectInfo {
            key: "AWSLogs/ConfigSnapshot-x.json.gz".to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap(),
            storage_class: "STANDARD".to_string(),
            size: 1,
        };
        assert!(collector.passes_filters(&at_threshold));
    }

    #[test]
    fn test_key_pattern_is_anchored_at_key_start() {
        let collector = ObjectStoreCollector::new(
            NullStore,
            "config-snapshots",
            "",
            r"AWSLogs/.*\.json\.gz$",
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            vec!["STANDARD".to_string()],
        )
        .unwrap();

        assert!(collector.passes_filters(&object(
            "AWSLogs/1/ConfigSnapshot-a.json.gz",
            2,
            "STANDARD"
        )));
        // A mid-key occurrence of the pattern is not a match.
        assert!(!collector.passes_filters(&object(
            "backup/AWSLogs/1/ConfigSnapshot-a.json.gz",
            2,
            "STANDARD"
        )));
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let result = ObjectStoreCollector::new(
            NullStore,
            "b",
            "",
            "(unclosed",
            Utc::now(),
            vec!["STANDARD".to_string()],
        );
        assert!(matches!(result, Err(CollectError::Config(_))));
    }
}
