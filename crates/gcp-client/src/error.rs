//! Compute client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Compute Engine API
#[derive(Debug, Error)]
pub enum ComputeError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Compute API returned an error
    #[error("Compute API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (rejected token, token exchange failure)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Service account credentials missing or malformed
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists (HTTP 409)
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl ComputeError {
    /// Whether the error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error reports a conflicting, already existing resource.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}
