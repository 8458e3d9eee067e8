//! Object-store client: paginated listing and object retrieval.
//!
//! The collector only needs two operations, so they sit behind a trait and
//! the shipped implementation speaks the S3 ListObjectsV2 REST protocol
//! (XML responses) against any compatible endpoint. Request signing is an
//! external concern; the endpoint is expected to be reachable as
//! configured (gateway, presigned base URL, or anonymous access).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{CollectError, Result};

/// One listed object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub storage_class: String,
    pub size: i64,
}

/// One page of an object listing.
#[derive(Debug, Clone)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    /// Continuation token for the next page, if the listing is truncated.
    pub next_token: Option<String>,
}

/// Minimal object-store surface consumed by the bucket collector.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of the listing for `bucket`/`prefix`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage>;

    /// Fetch one object's bytes.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// HTTP client for S3-compatible endpoints.
pub struct HttpObjectStore {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage> {
        let url = format!("{}/{bucket}", self.endpoint);
        let mut request = self
            .http
            .get(&url)
            .query(&[("list-type", "2"), ("prefix", prefix)]);
        if let Some(token) = continuation {
            request = request.query(&[("continuation-token", token)]);
        }

        let body = request
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_list_document(&body)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{bucket}/{key}", self.endpoint);
        let bytes = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

// ── Listing wire format ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListEntry>,
    #[serde(default)]
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEntry {
    key: String,
    last_modified: DateTime<Utc>,
    #[serde(default = "default_storage_class")]
    storage_class: String,
    #[serde(default)]
    size: i64,
}

fn default_storage_class() -> String {
    "STANDARD".to_string()
}

fn parse_list_document(xml: &str) -> Result<ListPage> {
    let result: ListBucketResult = quick_xml::de::from_str(xml)
        .map_err(|e| CollectError::Decode(format!("object listing: {e}")))?;

    let next_token = if result.is_truncated {
        result.next_continuation_token
    } else {
        None
    };

    Ok(ListPage {
        objects: result
            .contents
            .into_iter()
            .map(|entry| ObjectInfo {
                key: entry.key,
                last_modified: entry.last_modified,
                storage_class: entry.storage_class,
                size: entry.size,
            })
            .collect(),
        next_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>config-snapshots</Name>
  <Prefix>AWSLogs/</Prefix>
  <KeyCount>2</KeyCount>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>token-abc</NextContinuationToken>
  <Contents>
    <Key>AWSLogs/1/ConfigSnapshot-1.json.gz</Key>
    <LastModified>2024-05-01T10:00:00.000Z</LastModified>
    <Size>2048</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>AWSLogs/1/ConfigSnapshot-2.json.gz</Key>
    <LastModified>2024-05-02T10:00:00.000Z</LastModified>
    <Size>4096</Size>
    <StorageClass>GLACIER</StorageClass>
  </Contents>
</ListBucketResult>"#;

    #[test]
    fn test_parse_listing_page() {
        let page = parse_list_document(LISTING).unwrap();
        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.next_token.as_deref(), Some("token-abc"));

        let first = &page.objects[0];
        assert_eq!(first.key, "AWSLogs/1/ConfigSnapshot-1.json.gz");
        assert_eq!(first.storage_class, "STANDARD");
        assert_eq!(first.size, 2048);
        assert_eq!(first.last_modified.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        assert_eq!(page.objects[1].storage_class, "GLACIER");
    }

    #[test]
    fn test_parse_final_page_has_no_token() {
        let xml = r#"<ListBucketResult>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>a.json.gz</Key>
    <LastModified>2024-05-01T10:00:00.000Z</LastModified>
  </Contents>
</ListBucketResult>"#;
        let page = parse_list_document(xml).unwrap();
        assert_eq!(page.objects.len(), 1);
        assert!(page.next_token.is_none());
        // Missing storage class falls back to STANDARD.
        assert_eq!(page.objects[0].storage_class, "STANDARD");
    }

    #[test]
    fn test_parse_empty_listing() {
        let xml = r#"<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>"#;
        let page = parse_list_document(xml).unwrap();
        assert!(page.objects.is_empty());
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_list_document("<oops").is_err());
    }
}
