//! CLI error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] leadline_core::Error),
    #[error(transparent)]
    Api(#[from] leadline_core::remote::ApiError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Not signed in. Run `leadline auth login` first.")]
    NotAuthenticated,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Lead not found: {0}")]
    LeadNotFound(String),
}
