//! Registry bootstrap: discover the set of valid resource-type names from
//! the remote schema catalog, create their uniqueness constraints, and
//! persist the list for collectors that need a default type list.
//!
//! This is one-time tooling, not part of the steady-state pipeline.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use confgraph_graph::{GraphClient, TypeRegistry};

use crate::error::Result;

const GITHUB_API: &str = "https://api.github.com";

/// The provider's published resource-schema repository.
const SCHEMA_OWNER: &str = "awslabs";
const SCHEMA_REPO: &str = "aws-config-resource-schema";
const SCHEMA_PATH: &str = "config/properties/resource-types";

/// Suffix carried by every per-type schema file in the catalog.
const SCHEMA_FILE_SUFFIX: &str = ".properties.json";

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
}

/// Client for the schema catalog (GitHub repository contents API).
pub struct SchemaCatalog {
    http: reqwest::Client,
    base_url: String,
}

impl SchemaCatalog {
    pub fn new() -> Result<Self> {
        Self::with_base_url(GITHUB_API)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetch the list of known resource-type identifiers.
    pub async fn resource_types(&self, token: Option<&str>) -> Result<Vec<String>> {
        let url = format!(
            "{}/repos/{SCHEMA_OWNER}/{SCHEMA_REPO}/contents/{SCHEMA_PATH}",
            self.base_url
        );

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "confgraph");
        if let Some(token) = token {
            request = request.header("Authorization", format!("token {token}"));
        }

        let entries: Vec<CatalogEntry> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(entries
            .iter()
            .filter_map(|entry| type_from_schema_file(&entry.name))
            .collect())
    }
}

/// `AWS::EC2::Instance.properties.json` names the type `AWS::EC2::Instance`.
fn type_from_schema_file(file_name: &str) -> Option<String> {
    file_name
        .strip_suffix(SCHEMA_FILE_SUFFIX)
        .map(str::to_string)
}

/// Fetch the catalog, ensure a uniqueness constraint for every type, and
/// persist the ordered type list to `output`. Returns the type count.
pub async fn bootstrap_registry(
    graph: &GraphClient,
    catalog: &SchemaCatalog,
    token: Option<&str>,
    output: &Path,
) -> Result<usize> {
    let types = catalog.resource_types(token).await?;
    tracing::info!(types = types.len(), "Fetched resource-type catalog");

    let registry = TypeRegistry::new();
    for resource_type in &types {
        registry.ensure_label(graph, resource_type).await?;
    }

    write_resource_types(output, &types)?;
    tracing::info!(output = %output.display(), types = types.len(), "Wrote resource-type registry");
    Ok(types.len())
}

/// Persist the registry as an ordered JSON array.
pub fn write_resource_types(path: &Path, types: &[String]) -> Result<()> {
    serde_json::to_writer_pretty(File::create(path)?, types)?;
    Ok(())
}

/// Load a previously persisted registry.
pub fn load_resource_types(path: &Path) -> Result<Vec<String>> {
    Ok(serde_json::from_reader(File::open(path)?)?)
}
