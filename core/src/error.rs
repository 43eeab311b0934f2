//! Error types for the fetch client.
//!
//! # Design
//! `Transport` and `Http` mirror the two ways a round-trip can fail: the
//! transport never produced a response, or it produced one outside the 2xx
//! range. The unauthorized short-circuit is not an error on the main
//! `request` path (it is `Outcome::Unauthorized`); `Unauthorized` here only
//! surfaces from typed helpers that have no other way to report it.

use thiserror::Error;

/// Errors returned by `ApiClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport failed before any response arrived.
    #[error("request to `{endpoint}` failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The server answered outside the 2xx range. `body` is the response text.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The server answered 401 and the stored token was discarded.
    #[error("unauthorized")]
    Unauthorized,

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A successful response could not be decoded into the expected shape.
    #[error("decoding failed: {0}")]
    Decode(String),

    /// A header name or value the transport refused.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    /// Status code carried by an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure reported by a [`crate::transport::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection-level failure (DNS, refused, reset, TLS).
    #[error("connection error: {0}")]
    Connection(String),

    /// The request could not be constructed by the transport.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Attach the endpoint that was being requested.
    pub(crate) fn into_client_error(self, endpoint: &str) -> ClientError {
        match self {
            TransportError::InvalidHeader(msg) => ClientError::InvalidHeader(msg),
            other => ClientError::Transport {
                endpoint: endpoint.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Errors from loading a `ClientConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable `{0}`")]
    MissingVar(&'static str),

    #[error("invalid value for `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}
