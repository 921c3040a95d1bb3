//! Envelope encryption of whole objects.
//!
//! Every call to [`encrypt`] draws a fresh content key and nonce, seals the
//! payload with the configured [`ContentCipher`], and wraps the content key
//! under the KEK. The wrapped payload is the protocol tag (`"2.0"` padded to
//! eight bytes) followed by the key, so a wrapped key cannot be replayed
//! into a different protocol version.

use crate::cipher::{
    ContentCipher, DEFAULT_REGION_LENGTH, NONCE_SIZE, decrypt_regions, encrypt_regions,
};
use crate::error::{CryptoError, CryptoResult};
use crate::kek::{KeyEncryptionKey, KeyResolver, KeyWrapAlgorithm};
use crate::key::{CONTENT_KEY_SIZE, ContentKey};
use crate::metadata::{
    EncryptedRegionInfo, EncryptionAgent, EncryptionMetadata, PROTOCOL_V2, WrappedContentKey,
};
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use zeroize::Zeroizing;

const WRAP_PREFIX: [u8; 8] = *b"2.0\0\0\0\0\0";

/// Algorithm choices for new envelopes. Decryption always follows the
/// metadata, never these options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeOptions {
    pub key_wrap_algorithm: KeyWrapAlgorithm,
    pub content_cipher: ContentCipher,
    /// Plaintext bytes per sealed region.
    pub region_length: usize,
}

impl Default for EnvelopeOptions {
    fn default() -> Self {
        Self {
            key_wrap_algorithm: KeyWrapAlgorithm::RsaOaep,
            content_cipher: ContentCipher::Aes256Gcm,
            region_length: DEFAULT_REGION_LENGTH,
        }
    }
}

/// Encrypts `plaintext` under a fresh content key wrapped by `kek`.
pub async fn encrypt(
    plaintext: &[u8],
    kek: &dyn KeyEncryptionKey,
    options: &EnvelopeOptions,
) -> CryptoResult<(Vec<u8>, EncryptionMetadata)> {
    let cek = ContentKey::generate();
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let mut framed = Zeroizing::new(Vec::with_capacity(WRAP_PREFIX.len() + CONTENT_KEY_SIZE));
    framed.extend_from_slice(&WRAP_PREFIX);
    framed.extend_from_slice(cek.as_bytes());
    let encrypted_key = kek.wrap_key(options.key_wrap_algorithm, &framed).await?;

    let ciphertext = encrypt_regions(
        options.content_cipher,
        &cek,
        &nonce,
        plaintext,
        options.region_length,
    )?;

    let mut key_wrapping_metadata = BTreeMap::new();
    key_wrapping_metadata.insert(
        "EncryptionLibrary".to_string(),
        concat!("blobseal-crypto ", env!("CARGO_PKG_VERSION")).to_string(),
    );

    let metadata = EncryptionMetadata {
        wrapped_content_key: WrappedContentKey {
            key_id: kek.key_id().to_string(),
            encrypted_key,
            algorithm: options.key_wrap_algorithm,
        },
        encryption_agent: EncryptionAgent {
            protocol: PROTOCOL_V2.to_string(),
            encryption_algorithm: options.content_cipher,
        },
        content_nonce: nonce.to_vec(),
        encrypted_region_info: EncryptedRegionInfo {
            data_length: options.region_length as u64,
            nonce_length: NONCE_SIZE as u32,
        },
        plaintext_length: plaintext.len() as u64,
        key_wrapping_metadata,
    };

    Ok((ciphertext, metadata))
}

/// Decrypts an envelope, resolving the KEK from the metadata's key id.
pub async fn decrypt(
    ciphertext: &[u8],
    metadata: &EncryptionMetadata,
    resolver: &dyn KeyResolver,
) -> CryptoResult<Vec<u8>> {
    metadata.validate()?;
    let kek = resolver
        .resolve(&metadata.wrapped_content_key.key_id)
        .await?;
    open(ciphertext, metadata, kek.as_ref()).await
}

/// Decrypts with an already-held KEK. Metadata must already be validated.
async fn open(
    ciphertext: &[u8],
    metadata: &EncryptionMetadata,
    kek: &dyn KeyEncryptionKey,
) -> CryptoResult<Vec<u8>> {
    let wrapped = &metadata.wrapped_content_key;
    let framed = Zeroizing::new(kek.unwrap_key(wrapped.algorithm, &wrapped.encrypted_key).await?);

    let cek = framed
        .strip_prefix(&WRAP_PREFIX)
        .and_then(ContentKey::from_slice)
        .ok_or_else(|| {
            CryptoError::AuthenticationFailure(
                "unwrapped content key has an unexpected protocol tag or length".to_string(),
            )
        })?;

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&metadata.content_nonce);

    decrypt_regions(
        metadata.encryption_agent.encryption_algorithm,
        &cek,
        &nonce,
        ciphertext,
        metadata.encrypted_region_info.data_length as usize,
        metadata.plaintext_length,
    )
}

/// Client-side encryption settings handed to a storage client: the wrap
/// algorithm and cipher, the KEK used for uploads, and the resolver used for
/// downloads.
#[derive(Clone, Default)]
pub struct EnvelopeEncryptor {
    options: EnvelopeOptions,
    key_encryption_key: Option<Arc<dyn KeyEncryptionKey>>,
    key_resolver: Option<Arc<dyn KeyResolver>>,
}

impl EnvelopeEncryptor {
    pub fn new(options: EnvelopeOptions) -> Self {
        Self {
            options,
            key_encryption_key: None,
            key_resolver: None,
        }
    }

    pub fn with_key_encryption_key(mut self, kek: Arc<dyn KeyEncryptionKey>) -> Self {
        self.key_encryption_key = Some(kek);
        self
    }

    pub fn with_key_resolver(mut self, resolver: Arc<dyn KeyResolver>) -> Self {
        self.key_resolver = Some(resolver);
        self
    }

    pub fn options(&self) -> &EnvelopeOptions {
        &self.options
    }

    /// Identifier of the upload KEK, if one is configured.
    pub fn key_id(&self) -> Option<&str> {
        self.key_encryption_key.as_deref().map(|kek| kek.key_id())
    }

    /// Encrypts with the configured KEK.
    pub async fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<(Vec<u8>, EncryptionMetadata)> {
        let kek = self.key_encryption_key.as_deref().ok_or_else(|| {
            CryptoError::KeyOperation("no key encryption key configured for encryption".to_string())
        })?;
        encrypt(plaintext, kek, &self.options).await
    }

    /// Decrypts using the resolver when one is configured, otherwise the
    /// held KEK if its id matches the metadata.
    pub async fn decrypt(
        &self,
        ciphertext: &[u8],
        metadata: &EncryptionMetadata,
    ) -> CryptoResult<Vec<u8>> {
        if let Some(resolver) = self.key_resolver.as_deref() {
            return decrypt(ciphertext, metadata, resolver).await;
        }

        metadata.validate()?;
        let key_id = &metadata.wrapped_content_key.key_id;
        match self.key_encryption_key.as_deref() {
            Some(kek) if kek.key_id() == key_id => open(ciphertext, metadata, kek).await,
            _ => Err(CryptoError::KeyNotFound(format!(
                "no resolver configured and held key does not match {key_id}"
            ))),
        }
    }
}

impl std::fmt::Debug for EnvelopeEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeEncryptor")
            .field("options", &self.options)
            .field("key_id", &self.key_id())
            .field("has_resolver", &self.key_resolver.is_some())
            .finish()
    }
}
