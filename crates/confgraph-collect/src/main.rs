//! CLI entry point for the confgraph resource collector.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use confgraph_graph::{GraphClient, GraphConfig, MergeEngine};

use confgraph_collect::bootstrap::{bootstrap_registry, load_resource_types, SchemaCatalog};
use confgraph_collect::bucket::{default_last_modified, ObjectStoreCollector};
use confgraph_collect::config::CollectConfig;
use confgraph_collect::discovery::{DiscoveryCollector, HttpDiscoveryApi, ResourceFilters};
use confgraph_collect::local::LocalCollector;
use confgraph_collect::object_store::HttpObjectStore;

#[derive(Parser)]
#[command(name = "confgraph")]
#[command(about = "Cloud-resource configuration collector for a Neo4j knowledge graph")]
struct Cli {
    /// Neo4j connection URI (overrides config file).
    #[arg(long)]
    neo4j_uri: Option<String>,

    /// Neo4j username.
    #[arg(long)]
    neo4j_user: Option<String>,

    /// Neo4j password.
    #[arg(long)]
    neo4j_password: Option<String>,

    /// Config file prefix (default: confgraph).
    #[arg(short, long, default_value = "confgraph")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect gzipped snapshot objects from an object-store bucket.
    S3 {
        /// Bucket name.
        bucket: String,

        /// Key prefix to list under.
        #[arg(long, default_value = "")]
        prefix: String,

        /// Regex that keys must match, from the start of the key (default
        /// from config).
        #[arg(long)]
        pattern: Option<String>,

        /// Minimum last-modified timestamp, RFC 3339 (default: look-back
        /// window from config).
        #[arg(long, value_parser = parse_timestamp)]
        last_modified: Option<DateTime<Utc>>,

        /// Allowed storage class; repeat for several (default from config).
        #[arg(long = "storage-class")]
        storage_classes: Vec<String>,

        /// Object-store endpoint override.
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Collect snapshot JSON files from a local directory.
    Local {
        /// Directory holding *.json snapshot files.
        path: PathBuf,
    },

    /// Collect resources from the discovery API.
    Api {
        /// Configuration aggregator name.
        #[arg(long, default_value = "default")]
        aggregator_name: String,

        /// Query the local account instead of the aggregation view.
        #[arg(long)]
        no_aggregator: bool,

        /// Resource type to collect; repeat for several (default: the
        /// persisted registry).
        #[arg(long = "resource-type")]
        resource_types: Vec<String>,

        /// Restrict aggregate results to one region.
        #[arg(long)]
        filter_region: Option<String>,

        /// Discovery-API endpoint override.
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Fetch the resource-type catalog, create constraints, and persist
    /// the registry file.
    Bootstrap {
        /// Output path for the registry file.
        #[arg(long, default_value = "resource-types.json")]
        output: PathBuf,

        /// Token for the schema-catalog API, if required.
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let collect_config = load_collect_config(&cli.config)?;

    let graph_config = load_graph_config(&cli);
    let graph = GraphClient::connect(&graph_config).await?;
    let engine = MergeEngine::new(graph.clone());

    match cli.command {
        Command::S3 {
            bucket,
            prefix,
            pattern,
            last_modified,
            storage_classes,
            endpoint,
        } => {
            let endpoint = endpoint.unwrap_or_else(|| collect_config.object_store_endpoint.clone());
            let pattern = pattern.unwrap_or_else(|| collect_config.key_pattern.clone());
            let last_modified = last_modified
                .unwrap_or_else(|| default_last_modified(collect_config.lookback_hours));
            let storage_classes = if storage_classes.is_empty() {
                collect_config.storage_classes.clone()
            } else {
                storage_classes
            };

            let store = HttpObjectStore::new(endpoint)?;
            let collector = ObjectStoreCollector::new(
                store,
                bucket,
                prefix,
                &pattern,
                last_modified,
                storage_classes,
            )?;
            collector.collect(&engine).await?;
        }

        Command::Local { path } => {
            let collector = LocalCollector::new(path);
            collector.collect(&engine).await?;
        }

        Command::Api {
            aggregator_name,
            no_aggregator,
            resource_types,
            filter_region,
            endpoint,
        } => {
            let endpoint = endpoint.unwrap_or_else(|| collect_config.discovery_endpoint.clone());
            let resource_types = if resource_types.is_empty() {
                load_resource_types(collect_config.registry_path.as_ref()).with_context(|| {
                    format!(
                        "no --resource-type given and no registry at {}; run `confgraph bootstrap`",
                        collect_config.registry_path
                    )
                })?
            } else {
                resource_types
            };
            let filters = filter_region.map(|region| ResourceFilters {
                region: Some(region),
                ..Default::default()
            });

            let api = HttpDiscoveryApi::new(endpoint)?;
            let collector = DiscoveryCollector::new(
                api,
                aggregator_name,
                !no_aggregator,
                resource_types,
                filters,
            );
            collector.collect(&engine).await?;
        }

        Command::Bootstrap { output, token } => {
            let catalog = SchemaCatalog::new()?;
            bootstrap_registry(&graph, &catalog, token.as_deref(), &output).await?;
        }
    }

    Ok(())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp {s:?}: {e}"))
}

fn load_collect_config(file_prefix: &str) -> anyhow::Result<CollectConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("CONFGRAPH_COLLECT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<CollectConfig>("collect") {
        Ok(c) => Ok(c),
        Err(_) => Ok(CollectConfig::default()),
    }
}

fn load_graph_config(cli: &Cli) -> GraphConfig {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(&cli.config).required(false))
        .add_source(
            config::Environment::with_prefix("CONFGRAPH")
                .separator("__")
                .try_parsing(true),
        )
        .build();

    let mut graph_config = match cfg {
        Ok(c) => GraphConfig {
            uri: c
                .get_string("neo4j.uri")
                .unwrap_or_else(|_| GraphConfig::default().uri),
            user: c
                .get_string("neo4j.user")
                .unwrap_or_else(|_| GraphConfig::default().user),
            password: c
                .get_string("neo4j.password")
                .unwrap_or_else(|_| GraphConfig::default().password),
            ..Default::default()
        },
        Err(_) => GraphConfig::default(),
    };

    if let Some(uri) = &cli.neo4j_uri {
        graph_config.uri = uri.clone();
    }
    if let Some(user) = &cli.neo4j_user {
        graph_config.user = user.clone();
    }
    if let Some(password) = &cli.neo4j_password {
        graph_config.password = password.clone();
    }
    graph_config
}
