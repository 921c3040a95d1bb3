//! Envelope encryption error types.

use thiserror::Error;

/// Result type for envelope encryption operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening an envelope.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A wrap, unwrap or key lookup against the key service failed.
    /// Callers may retry at their own discretion.
    #[error("key operation failed: {0}")]
    KeyOperation(String),

    /// The key identifier in the metadata could not be resolved.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Tag verification or wrapped-key verification failed.
    /// Never accompanied by plaintext.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The local cipher refused to encrypt.
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid encryption metadata: {0}")]
    InvalidMetadata(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
