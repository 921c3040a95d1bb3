//! Blob client with client-side envelope encryption.
//!
//! Plaintext never reaches the transport. Upload seals the payload and
//! stores the encryption metadata next to it under `encryptiondata`;
//! download reads that entry back, resolves the key-encryption key and
//! opens the payload.

use crate::blob_transport::BlobTransport;
use crate::error::CloudResult;
use blobseal_crypto::{CryptoError, ENCRYPTION_DATA_KEY, EncryptionMetadata, EnvelopeEncryptor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Handle on one encrypted blob.
pub struct EncryptedBlobClient {
    transport: Arc<dyn BlobTransport>,
    encryptor: EnvelopeEncryptor,
    container: String,
    blob_name: String,
}

impl EncryptedBlobClient {
    pub fn new(
        transport: Arc<dyn BlobTransport>,
        encryptor: EnvelopeEncryptor,
        container: impl Into<String>,
        blob_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            encryptor,
            container: container.into(),
            blob_name: blob_name.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }

    pub fn encryptor(&self) -> &EnvelopeEncryptor {
        &self.encryptor
    }

    /// Encrypts `plaintext` and uploads it, overwriting any existing blob.
    pub async fn upload(&self, plaintext: &[u8]) -> CloudResult<EncryptionMetadata> {
        let (ciphertext, metadata) = self.encryptor.encrypt(plaintext).await?;

        let mut blob_metadata = BTreeMap::new();
        blob_metadata.insert(ENCRYPTION_DATA_KEY.to_string(), metadata.to_json()?);

        debug!(
            "uploading {} encrypted bytes ({} plaintext) to {}/{}",
            ciphertext.len(),
            plaintext.len(),
            self.container,
            self.blob_name
        );
        self.transport
            .upload(&self.container, &self.blob_name, ciphertext, &blob_metadata)
            .await?;

        Ok(metadata)
    }

    /// Downloads and decrypts the blob.
    pub async fn download(&self) -> CloudResult<Vec<u8>> {
        let blob = self
            .transport
            .download(&self.container, &self.blob_name)
            .await?;

        // Metadata keys are case-insensitive on the wire.
        let json = blob
            .metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(ENCRYPTION_DATA_KEY))
            .map(|(_, v)| v)
            .ok_or_else(|| {
                CryptoError::InvalidMetadata(format!(
                    "{}/{} has no {ENCRYPTION_DATA_KEY} entry; it was not uploaded encrypted",
                    self.container, self.blob_name
                ))
            })?;

        let metadata = EncryptionMetadata::from_json(json)?;
        let plaintext = self.encryptor.decrypt(&blob.data, &metadata).await?;

        debug!(
            "decrypted {} bytes from {}/{}",
            plaintext.len(),
            self.container,
            self.blob_name
        );
        Ok(plaintext)
    }

    pub async fn exists(&self) -> CloudResult<bool> {
        self.transport.exists(&self.container, &self.blob_name).await
    }

    pub async fn delete(&self) -> CloudResult<()> {
        self.transport.delete(&self.container, &self.blob_name).await
    }
}
