//! confgraph-core: Shared types and record normalization for the confgraph pipeline.
//!
//! This crate provides the foundational pieces used across all confgraph components:
//! - `ResourceIdentity` and the property model for the knowledge graph
//! - `NormalizedRecord` / `RelationshipSpec` describing one merge unit
//! - The record normalizer that decomposes raw configuration items
//! - Common error types

pub mod error;
pub mod normalize;
pub mod types;

pub use error::NormalizeError;
pub use normalize::{normalize_item, UNKNOWN_RELATIONSHIP};
pub use types::{NormalizedRecord, PropertyMap, PropertyValue, RelationshipSpec, ResourceIdentity};
