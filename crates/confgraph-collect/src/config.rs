//! Configuration for the confgraph collectors.

use serde::Deserialize;

/// Top-level collector configuration.
///
/// Loaded from the `[collect]` section of `confgraph.toml` or
/// `CONFGRAPH_COLLECT__` environment variables; CLI flags override both.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectConfig {
    /// Look-back window for the object-store enumerator, in hours, used
    /// when no explicit last-modified lower bound is given.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,

    /// Storage classes eligible for fetching; objects in any other class
    /// are skipped with a logged reason.
    #[serde(default = "default_storage_classes")]
    pub storage_classes: Vec<String>,

    /// Regex that object keys must match to be fetched, anchored at the
    /// start of the key.
    #[serde(default = "default_key_pattern")]
    pub key_pattern: String,

    /// Object-store endpoint (any S3-compatible listing endpoint).
    #[serde(default = "default_object_store_endpoint")]
    pub object_store_endpoint: String,

    /// Discovery-API endpoint.
    #[serde(default = "default_discovery_endpoint")]
    pub discovery_endpoint: String,

    /// Persisted registry of known resource types, used by the
    /// discovery-API collector when no explicit type list is given.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,
}

fn default_lookback_hours() -> u64 {
    24
}

fn default_storage_classes() -> Vec<String> {
    ["STANDARD", "STANDARD_IA", "REDUCED_REDUNDANCY"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_key_pattern() -> String {
    r".*\.json\.gz$".to_string()
}

fn default_object_store_endpoint() -> String {
    "https://s3.amazonaws.com".to_string()
}

fn default_discovery_endpoint() -> String {
    "https://config.us-east-1.amazonaws.com".to_string()
}

fn default_registry_path() -> String {
    "resource-types.json".to_string()
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            storage_classes: default_storage_classes(),
            key_pattern: default_key_pattern(),
            object_store_endpoint: default_object_store_endpoint(),
            discovery_endpoint: default_discovery_endpoint(),
            registry_path: default_registry_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CollectConfig::default();
        assert_eq!(config.lookback_hours, 24);
        assert_eq!(
            config.storage_classes,
            vec!["STANDARD", "STANDARD_IA", "REDUCED_REDUNDANCY"]
        );
        assert_eq!(config.key_pattern, r".*\.json\.gz$");
        assert_eq!(config.registry_path, "resource-types.json");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: CollectConfig = toml_from_str("lookback_hours = 6");
        assert_eq!(config.lookback_hours, 6);
        assert_eq!(config.key_pattern, r".*\.json\.gz$");
    }

    fn toml_from_str(s: &str) -> CollectConfig {
        config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
