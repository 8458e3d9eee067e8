//! Local-filesystem collector: a directory of snapshot JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use confgraph_graph::MergeEngine;

use crate::error::Result;
use crate::snapshot::{merge_items, parse_snapshot, CollectStats};

/// Collector over one directory of uncompressed `*.json` snapshot files
/// (non-recursive).
pub struct LocalCollector {
    path: PathBuf,
}

impl LocalCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Merge every snapshot file in the directory. A file that fails to
    /// read or parse is logged and skipped; a missing or unreadable
    /// directory aborts the run.
    pub async fn collect(&self, engine: &MergeEngine) -> Result<CollectStats> {
        let mut stats = CollectStats::default();

        for path in json_files(&self.path)? {
            stats.scanned += 1;
            stats.matched += 1;

            if let Err(e) = self.ingest_file(engine, &path, &mut stats).await {
                stats.failed_objects += 1;
                tracing::warn!(path = %path.display(), error = %e, "Skipping file");
            }
        }

        tracing::info!(
            path = %self.path.display(),
            scanned = stats.scanned,
            merged = stats.merged,
            failed_items = stats.failed_items,
            failed_objects = stats.failed_objects,
            "Local collection complete"
        );
        Ok(stats)
    }

    async fn ingest_file(
        &self,
        engine: &MergeEngine,
        path: &Path,
        stats: &mut CollectStats,
    ) -> Result<()> {
        let body = fs::read(path)?;
        let items = parse_snapshot(&body)?;
        tracing::debug!(path = %path.display(), items = items.len(), "Parsed snapshot file");

        merge_items(engine, items, stats).await;
        Ok(())
    }
}

/// List the `*.json` entries of one directory, in directory order.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_json = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}
