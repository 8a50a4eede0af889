//! Azure client errors

use thiserror::Error;

/// Errors that can occur when talking to Azure Resource Manager
#[derive(Debug, Error)]
pub enum AzureError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource Manager returned an error response
    #[error("Azure API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token acquisition failed or the principal was rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A long-running operation finished in a failed or canceled state
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// A long-running operation did not finish in time
    #[error("Operation timed out: {0}")]
    OperationTimeout(String),

    /// Response was well-formed HTTP but missing data we need
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AzureError {
    /// True when the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, AzureError::NotFound(_))
    }
}
