//! Error types for the reaction client, one enum per concern.

use thiserror::Error;

/// Input rejected locally, before any network call is made.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A presentation title must contain at least one non-whitespace character.
    #[error("title must not be empty")]
    EmptyTitle,
}

/// Failure of a single REST call. One attempt per call, no retries;
/// callers decide whether to try again.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network failure or request timeout (30s bound).
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// No presentation exists for the given id.
    #[error("presentation not found: {0}")]
    NotFound(String),

    /// The server answered 2xx but the body carried `success: false`.
    #[error("server rejected the request: {0}")]
    Rejected(String),

    /// A 2xx body that does not match the expected response schema.
    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured endpoint is not a valid absolute URL.
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure on the live channel. A malformed inbound frame is reported but
/// never closes the session; a socket error ends it.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed inbound frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid channel URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A fetch-after-signal that failed. The previously held snapshot is kept.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("snapshot refetch failed: {0}")]
    Fetch(#[from] TransportError),
}

/// Umbrella error for operations that can fail either locally or on the wire.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
