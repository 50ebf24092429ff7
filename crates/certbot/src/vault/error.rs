//! Secret store error types

use thiserror::Error;

/// Errors returned by the secret store
#[derive(Debug, Error)]
pub enum VaultError {
    /// Nothing is stored at the path (or it was deleted)
    #[error("No secret at '{path}'")]
    NotFound { path: String },

    /// The token may not access the path
    #[error("Permission denied for '{path}'")]
    PermissionDenied { path: String },

    /// Vault answered with an error status
    #[error("Vault API error: {0}")]
    Api(String),

    /// Connection settings are missing or invalid
    #[error("Invalid Vault configuration: {0}")]
    Configuration(String),

    /// The response body is not a KV v2 document
    #[error("Invalid Vault response: {0}")]
    InvalidResponse(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
