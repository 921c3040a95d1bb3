//! Workflow configuration.
//!
//! Defaults name the demo vault, key and storage account. Every field can be
//! overridden through `BLOBSEAL_*` environment variables; credentials are
//! never part of this struct.

use crate::error::{CloudError, CloudResult};
use crate::retry::RetryPolicy;
use blobseal_crypto::{ContentCipher, DEFAULT_REGION_LENGTH, EnvelopeOptions, KeyWrapAlgorithm};
use serde::{Deserialize, Serialize};

/// Where encrypted blobs are stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageBackend {
    /// Azure Blob Storage, authenticated with the same bearer credential as
    /// Key Vault.
    Azure { account_url: String },
    /// S3-compatible storage with static access keys from the environment.
    S3 {
        region: String,
        /// Optional endpoint override (for MinIO in testing).
        endpoint_override: Option<String>,
    },
}

/// Configuration for the key provisioning and blob round-trip workflow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Key Vault base URL (e.g., "https://my-vault.vault.azure.net").
    pub key_vault_url: String,

    /// Name of the RSA key created in the vault.
    pub key_name: String,

    /// RSA modulus size requested from the vault.
    pub key_size: u32,

    /// Algorithm passed to the vault's wrapkey/unwrapkey operations.
    pub key_wrap_algorithm: KeyWrapAlgorithm,

    /// Authenticated cipher used for payload bytes.
    pub content_cipher: ContentCipher,

    /// Plaintext bytes per encrypted region.
    pub region_length: usize,

    pub storage: StorageBackend,

    /// Container (Azure) or bucket (S3) name.
    pub container: String,

    pub blob_name: String,

    /// Identity provider host for the client-credentials token request.
    pub authority_host: String,

    /// Token refresh margin in seconds (refresh before expiry).
    pub token_refresh_margin_secs: i64,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    pub retry: RetryPolicy,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            key_vault_url: "https://my-by-demo-kv.vault.azure.net".to_string(),
            key_name: "BY-RSA-KEY".to_string(),
            key_size: 2048,
            key_wrap_algorithm: KeyWrapAlgorithm::RsaOaep,
            content_cipher: ContentCipher::Aes256Gcm,
            region_length: DEFAULT_REGION_LENGTH,
            storage: StorageBackend::Azure {
                account_url: "https://dohoneystorage.blob.core.windows.net".to_string(),
            },
            container: "blogdata".to_string(),
            blob_name: "BY-DEMO-ENCRYPTED-BLOB".to_string(),
            authority_host: "https://login.microsoftonline.com".to_string(),
            token_refresh_margin_secs: 300, // 5 minutes before expiry
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl CloudConfig {
    /// Defaults overridden by `BLOBSEAL_*` environment variables.
    pub fn from_env() -> CloudResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `BLOBSEAL_*` name. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> CloudResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("BLOBSEAL_KEY_VAULT_URL") {
            config.key_vault_url = v;
        }
        if let Some(v) = get("BLOBSEAL_KEY_NAME") {
            config.key_name = v;
        }
        if let Some(v) = get("BLOBSEAL_KEY_SIZE") {
            config.key_size = v
                .parse()
                .map_err(|_| {
                    CloudError::Config(format!("BLOBSEAL_KEY_SIZE is not a number: {v}"))
                })?;
        }
        if let Some(v) = get("BLOBSEAL_KEY_WRAP_ALGORITHM") {
            config.key_wrap_algorithm = v
                .parse()
                .map_err(|e| CloudError::Config(format!("BLOBSEAL_KEY_WRAP_ALGORITHM: {e}")))?;
        }
        if let Some(v) = get("BLOBSEAL_CONTENT_CIPHER") {
            config.content_cipher = v
                .parse()
                .map_err(|e| CloudError::Config(format!("BLOBSEAL_CONTENT_CIPHER: {e}")))?;
        }
        if let Some(v) = get("BLOBSEAL_CONTAINER") {
            config.container = v;
        }
        if let Some(v) = get("BLOBSEAL_BLOB_NAME") {
            config.blob_name = v;
        }
        if let Some(v) = get("BLOBSEAL_AUTHORITY_HOST") {
            config.authority_host = v;
        }

        match get("BLOBSEAL_STORAGE_BACKEND").as_deref() {
            None | Some("azure") => {
                if let Some(account_url) = get("BLOBSEAL_STORAGE_ACCOUNT_URL") {
                    config.storage = StorageBackend::Azure { account_url };
                }
            }
            Some("s3") => {
                config.storage = StorageBackend::S3 {
                    region: get("BLOBSEAL_S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    endpoint_override: get("BLOBSEAL_S3_ENDPOINT"),
                };
            }
            Some(other) => {
                return Err(CloudError::Config(format!(
                    "BLOBSEAL_STORAGE_BACKEND must be \"azure\" or \"s3\", got {other:?}"
                )));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would only fail later, mid-workflow.
    pub fn validate(&self) -> CloudResult<()> {
        for (name, url) in [
            ("key_vault_url", self.key_vault_url.as_str()),
            ("authority_host", self.authority_host.as_str()),
        ] {
            url::Url::parse(url)
                .map_err(|e| CloudError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        if let StorageBackend::Azure { account_url } = &self.storage {
            url::Url::parse(account_url)
                .map_err(|e| CloudError::Config(format!("account_url is not a valid URL: {e}")))?;
        }
        if self.key_name.is_empty() || self.container.is_empty() || self.blob_name.is_empty() {
            return Err(CloudError::Config(
                "key_name, container and blob_name must be non-empty".to_string(),
            ));
        }
        if self.region_length == 0 {
            return Err(CloudError::Config("region_length must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Envelope settings for new uploads.
    pub fn envelope_options(&self) -> EnvelopeOptions {
        EnvelopeOptions {
            key_wrap_algorithm: self.key_wrap_algorithm,
            content_cipher: self.content_cipher,
            region_length: self.region_length,
        }
    }
}
