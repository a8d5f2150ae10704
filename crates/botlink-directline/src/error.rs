//! Internal error types for Direct Line operations.
//!
//! These errors are internal to `botlink-directline` and are mapped to the
//! core transport error at the port boundary.

use thiserror::Error;

/// Result type alias for Direct Line operations.
pub type DirectLineResult<T> = Result<T, DirectLineError>;

/// Errors related to the Direct Line API.
#[derive(Debug, Error)]
pub enum DirectLineError {
    /// No channel secret configured.
    #[error("Direct Line secret is missing")]
    MissingSecret,

    /// Configuration is unusable.
    #[error("Invalid Direct Line configuration: {message}")]
    InvalidConfig { message: String },

    /// API request failed with an HTTP error status.
    #[error("Direct Line request failed with status {status}: {url}")]
    ApiRequestFailed { status: u16, url: String },

    /// API returned an invalid or unexpected response.
    #[error("Invalid response from Direct Line: {message}")]
    InvalidResponse { message: String },

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl DirectLineError {
    /// HTTP status of a failed request, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ApiRequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
