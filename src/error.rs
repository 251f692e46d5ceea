//! Error types for the chaser-sogou library.

use std::time::Duration;

use thiserror::Error;

use crate::models::ChallengeKind;

/// Main error type for the chaser-sogou library.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport failed (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] wreq::Error),

    /// Target answered with a non-success status
    #[error("Request failed with status {status_code}")]
    RequestFailure { status_code: u16 },

    /// A challenge was presented that has no automated remedy
    #[error("Challenge cannot be resolved automatically: {kind}")]
    ChallengeUnresolvable { kind: ChallengeKind },

    /// The configured solver could not produce a solution
    #[error("Challenge solver unavailable: {0}")]
    SolverUnavailable(String),

    /// The target rejected the submitted solution
    #[error("Challenge solution rejected: {message}")]
    ChallengeRejected { message: String },

    /// The challenge was still present after a successful unblock
    #[error("Challenge persisted after unblock ({kind}) for {url}")]
    ChallengeLoop { url: String, kind: ChallengeKind },

    /// A structured upstream reply could not be parsed or had the wrong shape
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// A structured upstream API reported a non-zero return code
    #[error("Upstream error {code}: {message}")]
    Upstream { code: i64, message: String },

    /// An operation exceeded its deadline
    #[error("{operation} cancelled after {after:?}")]
    Cancelled {
        operation: &'static str,
        after: Duration,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    /// Whether the error came from challenge handling rather than transport.
    pub fn is_challenge(&self) -> bool {
        matches!(
            self,
            FetchError::ChallengeUnresolvable { .. }
                | FetchError::ChallengeRejected { .. }
                | FetchError::ChallengeLoop { .. }
        )
    }
}

/// Result type alias for chaser-sogou operations.
pub type Result<T> = std::result::Result<T, FetchError>;
