//! confgraph-graph: Neo4j merge engine for the confgraph knowledge graph.
//!
//! This crate is the single mutation point for the graph. All writes flow
//! through the [`MergeEngine`] so that every statement is parameterized,
//! every label carries a uniqueness constraint, and re-merging the same
//! record is always a no-op.

pub mod client;
pub mod merge;
pub mod registry;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use merge::MergeEngine;
pub use registry::TypeRegistry;
