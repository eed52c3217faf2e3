//! Error types surfaced to callers.

use std::time::Duration;
use thiserror::Error;

pub use crate::auth::AuthError;
pub use crate::config::ConfigError;
pub use crate::http::response::HttpError;
pub use crate::net::TransportError;

/// Errors that can occur while dispatching a request.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or resolved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The signing strategy rejected the request.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// No pooled connection became available in time.
    #[error("No connection available after {0:?}")]
    PoolTimeout(Duration),

    /// The cluster is stopped or its pool is closed.
    #[error("Cluster '{0}' is not running")]
    NotStarted(String),

    /// The request cannot be put on the wire.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The connection failed while sending or receiving.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response body is not valid JSON.
    #[error("Failed to decode response body: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// The cluster answered with a non-success status.
    #[error("{0}")]
    Http(HttpError),
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Copyable discriminant of [`Error`], used for log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Auth,
    PoolTimeout,
    NotStarted,
    InvalidRequest,
    Transport,
    Decode,
    Http,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Auth => "auth",
            ErrorKind::PoolTimeout => "pool_timeout",
            ErrorKind::NotStarted => "not_started",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::Http => "http",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Auth(_) => ErrorKind::Auth,
            Error::PoolTimeout(_) => ErrorKind::PoolTimeout,
            Error::NotStarted(_) => ErrorKind::NotStarted,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::Http(_) => ErrorKind::Http,
        }
    }

    /// HTTP status for [`Error::Http`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => Some(e.status),
            _ => None,
        }
    }
}
