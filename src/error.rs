//! error types for the stream source and configuration.

use thiserror::Error;

/// failures reported by a stream source.
///
/// cloneable so it can ride inside bevy events and the cross-thread inbox.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("server responded with http status {status}")]
    Http { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    Closed,

    #[error("invalid stream url: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for StreamError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("unsupported base url scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("inbox capacity must be greater than zero")]
    InvalidInboxCapacity,

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
