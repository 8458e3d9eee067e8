//! Error types for record normalization.

use thiserror::Error;

/// Failures while decomposing one raw configuration item.
///
/// These are always per-item errors: the pipeline logs them together with
/// the offending payload and moves on to the next item.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("configuration item is not a JSON object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {0} is not a string")]
    NotAString(&'static str),

    #[error("relationships field is not an array")]
    InvalidRelationships,

    #[error("relationship entry is not a JSON object")]
    InvalidRelationshipEntry,
}
