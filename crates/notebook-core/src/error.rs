//! Error types for notebook-core

use thiserror::Error;

/// Result type alias using notebook-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notebook-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote API rejected the request
    #[error("Remote API error: {0}")]
    Api(String),

    /// Auth client error
    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    /// Record not found in the remote store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input, rejected before any remote call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),
}
