//! Discovery-API collector: enumerate resources straight from the
//! provider's configuration service, in aggregator or non-aggregator mode.
//!
//! Aggregator mode pages a cross-account listing and resolves each
//! identifier with a point lookup; non-aggregator mode pages the local
//! account's listing and resolves whole pages with a batch call. Both
//! yield fully-resolved configuration items, so no decompression or
//! snapshot parsing is involved.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use confgraph_graph::MergeEngine;

use crate::error::Result;
use crate::snapshot::{merge_item, merge_items, CollectStats};

// ── Wire types ───────────────────────────────────────────────────
// The aggregate calls use PascalCase fields, the non-aggregate calls
// camelCase; the shapes below mirror the service exactly.

/// Identifier of one resource in an aggregation view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateResourceIdentifier {
    pub source_account_id: String,
    pub source_region: String,
    pub resource_id: String,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

/// Identifier of one resource in the local account.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredResource {
    pub resource_id: String,
    pub resource_type: String,
    #[serde(default)]
    pub resource_name: Option<String>,
}

/// Lookup key for the batch resolution call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKey {
    pub resource_id: String,
    pub resource_type: String,
}

/// Optional free-form result filter for aggregate listings.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

/// One page of an aggregate listing.
#[derive(Debug, Clone)]
pub struct AggregateListPage {
    pub identifiers: Vec<AggregateResourceIdentifier>,
    pub next_token: Option<String>,
}

/// One page of a local-account listing.
#[derive(Debug, Clone)]
pub struct ResourceListPage {
    pub resources: Vec<DiscoveredResource>,
    pub next_token: Option<String>,
}

/// The discovery-API surface consumed by the collector.
#[async_trait]
pub trait DiscoveryApi: Send + Sync {
    async fn list_aggregate_resources(
        &self,
        aggregator: &str,
        resource_type: &str,
        filters: Option<&ResourceFilters>,
        next_token: Option<&str>,
    ) -> Result<AggregateListPage>;

    async fn get_aggregate_resource(
        &self,
        aggregator: &str,
        identifier: &AggregateResourceIdentifier,
    ) -> Result<Value>;

    async fn list_resources(
        &self,
        resource_type: &str,
        next_token: Option<&str>,
    ) -> Result<ResourceListPage>;

    async fn batch_get_resource_config(&self, keys: &[ResourceKey]) -> Result<Vec<Value>>;
}

// ── HTTP implementation ──────────────────────────────────────────

/// The JSON-RPC service name carried in the target header.
const TARGET_SERVICE: &str = "StarlingDoveService";

/// HTTP client for the discovery API's JSON protocol: one POST per call,
/// the operation named by the `X-Amz-Target` header. Request signing and
/// credential acquisition are external concerns.
pub struct HttpDiscoveryApi {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpDiscoveryApi {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_SERVICE}.{operation}"))
            .header("Content-Type", "application/x-amz-json-1.1")
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListAggregateRequest<'a> {
    configuration_aggregator_name: &'a str,
    resource_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a ResourceFilters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAggregateResponse {
    #[serde(default)]
    resource_identifiers: Vec<AggregateResourceIdentifier>,
    next_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetAggregateRequest<'a> {
    configuration_aggregator_name: &'a str,
    resource_identifier: &'a AggregateResourceIdentifier,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetAggregateResponse {
    configuration_item: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResourcesRequest<'a> {
    resource_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResourcesResponse {
    #[serde(default)]
    resource_identifiers: Vec<DiscoveredResource>,
    next_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetRequest<'a> {
    resource_keys: &'a [ResourceKey],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    base_configuration_items: Vec<Value>,
    #[serde(default)]
    unprocessed_resource_keys: Vec<ResourceKey>,
}

#[async_trait]
impl DiscoveryApi for HttpDiscoveryApi {
    async fn list_aggregate_resources(
        &self,
        aggregator: &str,
        resource_type: &str,
        filters: Option<&ResourceFilters>,
        next_token: Option<&str>,
    ) -> Result<AggregateListPage> {
        let response: ListAggregateResponse = self
            .call(
                "ListAggregateDiscoveredResources",
                &ListAggregateRequest {
                    configuration_aggregator_name: aggregator,
                    resource_type,
                    filters,
                    next_token,
                },
            )
            .await?;
        Ok(AggregateListPage {
            identifiers: response.resource_identifiers,
            next_token: response.next_token,
        })
    }

    async fn get_aggregate_resource(
        &self,
        aggregator: &str,
        identifier: &AggregateResourceIdentifier,
    ) -> Result<Value> {
        let response: GetAggregateResponse = self
            .call(
                "GetAggregateResourceConfig",
                &GetAggregateRequest {
                    configuration_aggregator_name: aggregator,
                    resource_identifier: identifier,
                },
            )
            .await?;
        Ok(response.configuration_item)
    }

    async fn list_resources(
        &self,
        resource_type: &str,
        next_token: Option<&str>,
    ) -> Result<ResourceListPage> {
        let response: ListResourcesResponse = self
            .call(
                "ListDiscoveredResources",
                &ListResourcesRequest {
                    resource_type,
                    next_token,
                },
            )
            .await?;
        Ok(ResourceListPage {
            resources: response.resource_identifiers,
            next_token: response.next_token,
        })
    }

    async fn batch_get_resource_config(&self, keys: &[ResourceKey]) -> Result<Vec<Value>> {
        let response: BatchGetResponse = self
            .call(
                "BatchGetResourceConfig",
                &BatchGetRequest {
                    resource_keys: keys,
                },
            )
            .await?;
        for key in &response.unprocessed_resource_keys {
            tracing::warn!(
                resource_id = %key.resource_id,
                resource_type = %key.resource_type,
                "Batch resolution left key unprocessed"
            );
        }
        Ok(response.base_configuration_items)
    }
}

// ── Collector ────────────────────────────────────────────────────

/// Collector over the discovery API for a fixed list of resource types.
pub struct DiscoveryCollector<A> {
    api: A,
    aggregator_name: String,
    aggregator_mode: bool,
    resource_types: Vec<String>,
    filters: Option<ResourceFilters>,
}

impl<A: DiscoveryApi> DiscoveryCollector<A> {
    pub fn new(
        api: A,
        aggregator_name: impl Into<String>,
        aggregator_mode: bool,
        resource_types: Vec<String>,
        filters: Option<ResourceFilters>,
    ) -> Self {
        Self {
            api,
            aggregator_name: aggregator_name.into(),
            aggregator_mode,
            resource_types,
            filters,
        }
    }

    /// Enumerate every configured resource type and merge each resolved
    /// configuration item. Listing or batch-resolution failures abort the
    /// run; a single point lookup failing is logged and skipped.
    pub async fn collect(&self, engine: &MergeEngine) -> Result<CollectStats> {
        let mut stats = CollectStats::default();

        for resource_type in &self.resource_types {
            tracing::info!(
                resource_type = %resource_type,
                aggregator_mode = self.aggregator_mode,
                "Enumerating resource type"
            );
            if self.aggregator_mode {
                self.collect_aggregate(engine, resource_type, &mut stats)
                    .await?;
            } else {
                self.collect_direct(engine, resource_type, &mut stats)
                    .await?;
            }
        }

        tracing::info!(
            resource_types = self.resource_types.len(),
            scanned = stats.scanned,
            merged = stats.merged,
            failed_items = stats.failed_items,
            failed_objects = stats.failed_objects,
            "Discovery-API collection complete"
        );
        Ok(stats)
    }

    async fn collect_aggregate(
        &self,
        engine: &MergeEngine,
        resource_type: &str,
        stats: &mut CollectStats,
    ) -> Result<()> {
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .api
                .list_aggregate_resources(
                    &self.aggregator_name,
                    resource_type,
                    self.filters.as_ref(),
                    next_token.as_deref(),
                )
                .await?;

            for identifier in &page.identifiers {
                stats.scanned += 1;
                stats.matched += 1;

                let item = match self
                    .api
                    .get_aggregate_resource(&self.aggregator_name, identifier)
                    .await
                {
                    Ok(item) => item,
                    Err(e) => {
                        stats.failed_objects += 1;
                        tracing::warn!(
                            resource_id = %identifier.resource_id,
                            error = %e,
                            "Skipping aggregate resource"
                        );
                        continue;
                    }
                };

                match merge_item(engine, item.clone()).await {
                    Ok(()) => stats.merged += 1,
                    Err(e) => {
                        stats.failed_items += 1;
                        tracing::error!(error = %e, item = %item, "Failed to merge configuration item");
                    }
                }
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(())
    }

    async fn collect_direct(
        &self,
        engine: &MergeEngine,
        resource_type: &str,
        stats: &mut CollectStats,
    ) -> Result<()> {
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .api
                .list_resources(resource_type, next_token.as_deref())
                .await?;

            stats.scanned += page.resources.len() as u64;
            stats.matched += page.resources.len() as u64;

            if !page.resources.is_empty() {
                let keys: Vec<ResourceKey> = page
                    .resources
                    .iter()
                    .map(|r| ResourceKey {
                        resource_id: r.resource_id.clone(),
                        resource_type: r.resource_type.clone(),
                    })
                    .collect();

                let items = self.api.batch_get_resource_config(&keys).await?;
                merge_items(engine, items, stats).await;
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_aggregate_request_shape() {
        let filters = ResourceFilters {
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        let request = ListAggregateRequest {
            configuration_aggregator_name: "default",
            resource_type: "AWS::EC2::Instance",
            filters: Some(&filters),
            next_token: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "ConfigurationAggregatorName": "default",
                "ResourceType": "AWS::EC2::Instance",
                "Filters": {"Region": "eu-west-1"}
            })
        );
    }

    #[test]
    fn test_list_aggregate_response_shape() {
        let response: ListAggregateResponse = serde_json::from_value(json!({
            "ResourceIdentifiers": [
                {
                    "SourceAccountId": "123456789012",
                    "SourceRegion": "us-east-1",
                    "ResourceId": "i-0abc",
                    "ResourceType": "AWS::EC2::Instance",
                    "ResourceName": "web-01"
                }
            ],
            "NextToken": "t1"
        }))
        .unwrap();
        assert_eq!(response.resource_identifiers.len(), 1);
        assert_eq!(response.resource_identifiers[0].resource_id, "i-0abc");
        assert_eq!(response.next_token.as_deref(), Some("t1"));
    }

    #[test]
    fn test_list_resources_shapes_are_camel_case() {
        let request = ListResourcesRequest {
            resource_type: "AWS::S3::Bucket",
            next_token: Some("t2"),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"resourceType": "AWS::S3::Bucket", "nextToken": "t2"})
        );

        let response: ListResourcesResponse = serde_json::from_value(json!({
            "resourceIdentifiers": [
                {"resourceId": "bkt-1", "resourceType": "AWS::S3::Bucket"}
            ]
        }))
        .unwrap();
        assert_eq!(response.resource_identifiers.len(), 1);
        assert!(response.next_token.is_none());
    }

    #[test]
    fn test_batch_get_shapes() {
        let keys = vec![ResourceKey {
            resource_id: "bkt-1".to_string(),
            resource_type: "AWS::S3::Bucket".to_string(),
        }];
        let value = serde_json::to_value(BatchGetRequest {
            resource_keys: &keys,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"resourceKeys": [
                {"resourceId": "bkt-1", "resourceType": "AWS::S3::Bucket"}
            ]})
        );

        let response: BatchGetResponse = serde_json::from_value(json!({
            "baseConfigurationItems": [{"resourceId": "bkt-1"}],
            "unprocessedResourceKeys": []
        }))
        .unwrap();
        assert_eq!(response.base_configuration_items.len(), 1);
        assert!(response.unprocessed_resource_keys.is_empty());
    }
}
