//! Key-encryption-key abstractions.
//!
//! A [`KeyEncryptionKey`] wraps and unwraps content keys; the private half
//! may live in a remote service. A [`KeyResolver`] turns the key identifier
//! recorded in metadata back into a usable KEK at decrypt time.

use crate::error::{CryptoError, CryptoResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Algorithm used to wrap the content key, named as in JWA.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyWrapAlgorithm {
    /// RSAES-OAEP with SHA-1 and MGF1-SHA-1.
    #[default]
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    /// RSAES-OAEP with SHA-256 and MGF1-SHA-256.
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaep256,
    /// RSAES-PKCS1-v1_5. Kept for keys provisioned by older clients.
    #[serde(rename = "RSA1_5")]
    Rsa15,
}

impl KeyWrapAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaOaep => "RSA-OAEP",
            Self::RsaOaep256 => "RSA-OAEP-256",
            Self::Rsa15 => "RSA1_5",
        }
    }
}

impl fmt::Display for KeyWrapAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyWrapAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA-OAEP" => Ok(Self::RsaOaep),
            "RSA-OAEP-256" => Ok(Self::RsaOaep256),
            "RSA1_5" => Ok(Self::Rsa15),
            other => Err(CryptoError::UnsupportedAlgorithm(format!(
                "unknown key wrap algorithm: {other}"
            ))),
        }
    }
}

/// A key capable of wrapping and unwrapping content keys.
#[async_trait]
pub trait KeyEncryptionKey: Send + Sync {
    /// Stable identifier recorded in metadata and later passed to a
    /// [`KeyResolver`].
    fn key_id(&self) -> &str;

    /// Encrypts `key` under this KEK.
    async fn wrap_key(&self, algorithm: KeyWrapAlgorithm, key: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypts a key previously produced by [`wrap_key`](Self::wrap_key).
    ///
    /// Implementations report a wrapped key that does not decrypt under this
    /// KEK as [`CryptoError::AuthenticationFailure`], and transport or
    /// service failures as [`CryptoError::KeyOperation`].
    async fn unwrap_key(
        &self,
        algorithm: KeyWrapAlgorithm,
        wrapped: &[u8],
    ) -> CryptoResult<Vec<u8>>;
}

/// Maps a key identifier back to a KEK.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolves `key_id`, failing with [`CryptoError::KeyNotFound`] when the
    /// identifier is unknown.
    async fn resolve(&self, key_id: &str) -> CryptoResult<Arc<dyn KeyEncryptionKey>>;
}
