//! Error types for Dispatchr
//!
//! Centralized error handling using thiserror. Per-task worker failures are not
//! errors here: they become `WorkerResult`s at the task boundary.

use std::time::Duration;

use thiserror::Error;

/// All error types that can occur in Dispatchr
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Signature registry is misconfigured (fatal at startup)
    #[error("Registry error: {0}")]
    Registry(String),

    /// A match rule pattern failed to compile
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration value out of range
    #[error("Config error: {0}")]
    Config(String),

    /// The test-run collaborator could not produce a report
    #[error("Test run error: {0}")]
    TestRun(String),

    /// Specialist worker could not be launched
    #[error("Worker error: {0}")]
    Worker(String),

    /// Operation exceeded its time budget
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Controller attempted an illegal state transition
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Dispatchr operations
pub type Result<T> = std::result::Result<T, DispatchError>;
