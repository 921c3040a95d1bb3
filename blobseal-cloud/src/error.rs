//! Cloud workflow error types.

use blobseal_crypto::CryptoError;
use thiserror::Error;

/// Result type for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur while talking to Key Vault or blob storage.
#[derive(Debug, Error)]
pub enum CloudError {
    /// A required credential environment variable is unset or empty.
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("key operation failed: {0}")]
    KeyOperation(String),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("round trip mismatch: downloaded {actual} bytes that differ from the {expected} uploaded")]
    RoundTripMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CloudError {
    /// True for failures worth retrying: connection problems, timeouts,
    /// throttling and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}
