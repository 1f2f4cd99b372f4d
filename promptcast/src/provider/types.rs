//! Provider types shared by the remote service adapters.

use std::fmt;

/// Errors that can occur while talking to a remote image service.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Request could not be sent or the response body could not be read
    HttpError(String),
    /// Service answered with a non-success status
    Status { status: u16, url: String },
    /// Response body was not what the adapter expected
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether repeating the request could succeed.
    ///
    /// Connection failures, server errors and rate limiting are transient;
    /// client errors and malformed bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::HttpError(_) => true,
            ProviderError::Status { status, .. } => *status >= 500 || *status == 429,
            ProviderError::InvalidResponse(_) => false,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::Status { status, url } => write!(f, "HTTP {} from {}", status, url),
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}
