//! Client configuration errors.

use thiserror::Error;

/// Errors raised while building an [`OtcKmsClient`](crate::OtcKmsClient).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is missing or empty.
    #[error("missing setting: {0}")]
    Missing(&'static str),

    /// The endpoint is not an http(s) URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(String),
}
