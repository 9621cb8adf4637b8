//! Cloud provider error types

use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The provider refused to create something because an identical
    /// resource is already there. Callers that create idempotently treat
    /// this as success.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No {service} endpoint in service catalog for region {region}")]
    EndpointNotFound { service: String, region: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
