//! VPP client error types.
//!
//! Every failure is a distinct variant carrying structured fields so callers
//! can match on the kind (and, for server-reported failures, the numeric
//! code) instead of parsing a formatted message.

use std::time::Duration;

/// A business error reported by the service inside a `status == -1` envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("({code}) {message}")]
pub struct DomainError {
    /// Numeric error code (`errorNumber`).
    pub code: i64,
    /// Human-readable message (`errorMessage`).
    pub message: String,
}

/// Errors from VPP service calls.
#[derive(Debug, thiserror::Error)]
pub enum VppError {
    /// Network, TLS or timeout failure. Not retried by the client.
    #[error("transport error calling {operation}: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    /// The service kept signalling overload (3xx or 503) after one retry.
    #[error("{operation} overloaded: HTTP {status}, last retry-after {retry_after:?}")]
    Overloaded {
        operation: String,
        status: u16,
        retry_after: Duration,
    },
    /// The service returned a non-2xx status that is not an overload signal.
    #[error("{operation} returned HTTP {status}: {body}")]
    Service {
        operation: String,
        status: u16,
        body: String,
    },
    /// The response body was not valid JSON or did not match the expected shape.
    #[error("failed to decode response from {operation}: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
    /// The request body could not be serialized.
    #[error("failed to encode request for {operation}: {source}")]
    Encode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
    /// The service reported a business error.
    #[error("{operation} failed: {source}")]
    Domain {
        operation: String,
        #[source]
        source: DomainError,
    },
    /// Dispatch was requested before bootstrap, or for a name the service
    /// configuration does not list.
    #[error("unknown operation: {operation}")]
    UnknownOperation { operation: String },
    /// A paged listing handed out a batch token it had already issued, so
    /// following it would never reach the end.
    #[error("{operation} repeated batch token {batch_token}")]
    PagingCycle { operation: String, batch_token: String },
    /// A request builder rejected its inputs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl VppError {
    /// The server-reported error, if this is a [`VppError::Domain`].
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Overloaded { .. })
    }
}
