//! Errors raised while loading or evaluating schemas.

use serde::Serialize;

/// A single failing JSON path, with expected/actual detail, surfaced on
/// schema mismatch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("no schema registered for {key}")]
    NotFound { key: String },
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("schema {key} is not valid JSON: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("schema {key} did not compile: {message}")]
    Compile { key: String, message: String },
    #[error("instance failed validation against {key}")]
    Validation {
        key: String,
        violations: Vec<SchemaViolation>,
    },
}
