//! confgraph-collect: Source enumerators for the confgraph knowledge graph.
//!
//! Three collectors feed the merge engine from different sources: an
//! object-store bucket of gzipped snapshot documents, a local directory of
//! JSON files, and the provider's discovery API. Each hides its own
//! pagination and absorbs per-record failures so that a run always
//! completes unless the source itself stops answering.

pub mod bootstrap;
pub mod bucket;
pub mod config;
pub mod discovery;
pub mod error;
pub mod local;
pub mod object_store;
pub mod snapshot;

pub use error::{CollectError, Result};
pub use snapshot::CollectStats;
