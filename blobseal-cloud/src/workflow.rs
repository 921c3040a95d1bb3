//! The provision, upload, download and verify sequence.
//!
//! ```text
//! credential ──► Key Vault: create RSA key ──► CryptographyClient (KEK)
//!                                                   │
//!          EnvelopeEncryptor ◄── KeyRegistry ◄──────┘
//!                 │
//!   upload ──► blob store ──► download ──► compare
//! ```
//!
//! Every step runs in order and the first failure ends the run.

use crate::azure_transport::AzureBlobTransport;
use crate::blob_transport::BlobTransport;
use crate::config::{CloudConfig, StorageBackend};
use crate::credential::TokenCredential;
use crate::credential_manager::CredentialManager;
use crate::encrypted_blob::EncryptedBlobClient;
use crate::error::{CloudError, CloudResult};
use crate::http::build_client;
use crate::key_registry::KeyRegistry;
use crate::key_vault::{KeyVaultClient, KeyVaultKeyResolver};
use crate::s3_transport::{S3Credentials, S3Transport};
use crate::types::KeyType;
use blobseal_crypto::{EncryptionMetadata, EnvelopeEncryptor, KeyEncryptionKey};
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Payload uploaded by the demo run.
pub const DEMO_PLAINTEXT: &str = "Blue Yonder Rocks!!!";

/// Outcome of a successful run.
#[derive(Clone, Debug)]
pub struct RoundTrip {
    /// Identifier of the vault key that wrapped the content key.
    pub key_id: String,
    pub metadata: EncryptionMetadata,
    /// Decrypted download, equal to the uploaded plaintext.
    pub plaintext: Vec<u8>,
}

impl RoundTrip {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.plaintext).into_owned()
    }
}

/// Builds the transport for the configured storage backend.
pub fn build_transport(
    config: &CloudConfig,
    http: Client,
    credentials: Arc<dyn TokenCredential>,
) -> CloudResult<Arc<dyn BlobTransport>> {
    Ok(match &config.storage {
        StorageBackend::Azure { account_url } => Arc::new(AzureBlobTransport::from_config(
            config,
            account_url,
            http,
            credentials,
        )?),
        StorageBackend::S3 {
            region,
            endpoint_override,
        } => Arc::new(S3Transport::new(
            &S3Credentials::from_env()?,
            region.clone(),
            endpoint_override.clone(),
        )),
    })
}

/// Provisions the key, then round-trips `plaintext` through encrypted
/// storage.
pub async fn run(
    config: &CloudConfig,
    credential: Arc<dyn TokenCredential>,
    plaintext: &[u8],
) -> CloudResult<RoundTrip> {
    config.validate()?;
    let http = build_client(config)?;
    let tokens: Arc<dyn TokenCredential> = Arc::new(CredentialManager::new(
        credential,
        config.token_refresh_margin_secs,
    ));

    let transport = build_transport(config, http.clone(), Arc::clone(&tokens))?;
    let vault = KeyVaultClient::from_config(config, http, tokens)?;

    info!("creating key {} in {}", config.key_name, vault.vault_url());
    let key = vault
        .create_key(&config.key_name, KeyType::Rsa, config.key_size)
        .await?;
    let kek: Arc<dyn KeyEncryptionKey> = Arc::new(vault.cryptography_client(&key));
    let key_id = kek.key_id().to_string();

    let registry = KeyRegistry::with_fallback(Arc::new(KeyVaultKeyResolver::new(vault)));
    registry.insert(Arc::clone(&kek)).await;

    let encryptor = EnvelopeEncryptor::new(config.envelope_options())
        .with_key_encryption_key(kek)
        .with_key_resolver(Arc::new(registry));
    let blob = EncryptedBlobClient::new(transport, encryptor, &config.container, &config.blob_name);

    info!(
        "uploading {} bytes to {}/{} ({}, key wrapped with {})",
        plaintext.len(),
        config.container,
        config.blob_name,
        config.content_cipher,
        config.key_wrap_algorithm
    );
    let metadata = blob.upload(plaintext).await?;

    info!("downloading {}/{}", config.container, config.blob_name);
    let downloaded = blob.download().await?;

    if downloaded != plaintext {
        return Err(CloudError::RoundTripMismatch {
            expected: plaintext.len(),
            actual: downloaded.len(),
        });
    }

    info!("round trip verified with {key_id}");
    Ok(RoundTrip {
        key_id,
        metadata,
        plaintext: downloaded,
    })
}
