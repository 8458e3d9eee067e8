//! Error types for the confgraph-collect crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Graph error: {0}")]
    Graph(#[from] confgraph_graph::GraphError),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Normalize error: {0}")]
    Normalize(#[from] confgraph_core::NormalizeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollectError>;
