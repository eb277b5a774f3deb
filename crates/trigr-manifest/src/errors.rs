use crate::types::SourceLocation;
use std::io;
use thiserror::Error;

/// Errors that can occur while assembling, routing or writing a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize manifest as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to serialize manifest as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{second}: duplicate endpoint key '{key}' (first defined at {first})")]
    DuplicateEndpointKey {
        key: String,
        first: SourceLocation,
        second: SourceLocation,
    },

    #[error("Endpoint '{key}' does not match its trigger; the dispatcher derives '{derived}'")]
    KeyMismatch { key: String, derived: String },

    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
