//! Error types for the backend client.

use thiserror::Error;

/// Errors raised while building or using a backend client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Endpoint or key missing at construction time.
    #[error("missing endpoint/key: {0}")]
    MissingCredentials(&'static str),

    /// Endpoint URL is not an absolute http(s) URL.
    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// The request never produced a response (connect, timeout, TLS).
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered 2xx with a body that is not JSON.
    #[error("failed to decode backend response: {0}")]
    Decode(String),

    /// The backend answered with an error status.
    #[error("{message}")]
    Backend { status: u16, message: String },
}

impl ClientError {
    /// Whether this error happened before any request was issued.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials(_) | Self::InvalidEndpoint { .. } | Self::Build(_)
        )
    }
}
