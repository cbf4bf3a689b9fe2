use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building a provider. Fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("metric provider name should be {expected}, found {found}")]
    ProviderMismatch { expected: String, found: String },

    #[error("invalid metrics provider address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("unable to read CA bundle {}: {source}", path.display())]
    CaBundleRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CA bundle {}: {reason}", path.display())]
    CaBundleInvalid { path: PathBuf, reason: String },

    #[error("invalid bearer token: {0}")]
    InvalidToken(String),

    #[error("unable to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Errors of a single backend query or liveness probe.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error ({error_type}): {message}")]
    Backend { error_type: String, message: String },

    #[error("unexpected response status {0}")]
    Status(u16),

    #[error("unable to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("received response status code: {0}")]
    Unhealthy(u16),
}
