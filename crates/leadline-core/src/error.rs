//! Error types for leadline-core

use thiserror::Error;

/// Result type alias using leadline-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in leadline-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Referenced row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote API error
    #[error("API error: {0}")]
    Api(#[from] crate::remote::ApiError),

    /// Illegal recording status transition
    #[error("Illegal recording transition: {from} -> {to}")]
    IllegalTransition {
        /// Status the recording currently holds
        from: crate::models::RecordingStatus,
        /// Status the caller attempted to move to
        to: crate::models::RecordingStatus,
    },

    /// Recording pipeline stage failure
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Secure credential storage error
    #[error("Credential storage error: {0}")]
    Credentials(String),
}
