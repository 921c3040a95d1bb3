//! In-process RSA key-encryption key.
//!
//! Holds the private key locally, so it is only suitable for tests, offline
//! tooling, or keys exported from a vault on purpose. Production flows use a
//! remote KEK whose private half never leaves the service.

use crate::error::{CryptoError, CryptoResult};
use crate::kek::{KeyEncryptionKey, KeyWrapAlgorithm};
use async_trait::async_trait;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::LineEnding;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

/// Default modulus size for generated keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

#[derive(Clone, Debug)]
pub struct LocalRsaKey {
    key_id: String,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl LocalRsaKey {
    /// Generates a fresh key pair of `bits` modulus size.
    pub fn generate(key_id: impl Into<String>, bits: usize) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyOperation(format!("RSA key generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            key_id: key_id.into(),
            private_key,
            public_key,
        })
    }

    pub fn from_pkcs1_pem(key_id: impl Into<String>, pem: &str) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| CryptoError::KeyOperation(format!("invalid PKCS#1 key: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            key_id: key_id.into(),
            private_key,
            public_key,
        })
    }

    pub fn to_pkcs1_pem(&self) -> CryptoResult<Zeroizing<String>> {
        self.private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyOperation(format!("PKCS#1 export failed: {e}")))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Same key material under a different identifier.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    /// Wraps `key` with the public half. Synchronous form of
    /// [`KeyEncryptionKey::wrap_key`].
    pub fn wrap(&self, algorithm: KeyWrapAlgorithm, key: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut rng = OsRng;
        let wrapped = match algorithm {
            KeyWrapAlgorithm::RsaOaep => {
                self.public_key
                    .encrypt(&mut rng, Oaep::new::<sha1::Sha1>(), key)
            }
            KeyWrapAlgorithm::RsaOaep256 => {
                self.public_key
                    .encrypt(&mut rng, Oaep::new::<sha2::Sha256>(), key)
            }
            KeyWrapAlgorithm::Rsa15 => self.public_key.encrypt(&mut rng, Pkcs1v15Encrypt, key),
        };

        wrapped.map_err(|e| CryptoError::KeyOperation(format!("{algorithm} wrap failed: {e}")))
    }

    pub fn unwrap(&self, algorithm: KeyWrapAlgorithm, wrapped: &[u8]) -> CryptoResult<Vec<u8>> {
        let unwrapped = match algorithm {
            KeyWrapAlgorithm::RsaOaep => self
                .private_key
                .decrypt(Oaep::new::<sha1::Sha1>(), wrapped),
            KeyWrapAlgorithm::RsaOaep256 => self
                .private_key
                .decrypt(Oaep::new::<sha2::Sha256>(), wrapped),
            KeyWrapAlgorithm::Rsa15 => self.private_key.decrypt(Pkcs1v15Encrypt, wrapped),
        };

        unwrapped.map_err(|_| {
            CryptoError::AuthenticationFailure(format!(
                "{algorithm} unwrap rejected by key {} (wrong key or tampered data)",
                self.key_id
            ))
        })
    }
}

#[async_trait]
impl KeyEncryptionKey for LocalRsaKey {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn wrap_key(&self, algorithm: KeyWrapAlgorithm, key: &[u8]) -> CryptoResult<Vec<u8>> {
        self.wrap(algorithm, key)
    }

    async fn unwrap_key(
        &self,
        algorithm: KeyWrapAlgorithm,
        wrapped: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        self.unwrap(algorithm, wrapped)
    }
}
