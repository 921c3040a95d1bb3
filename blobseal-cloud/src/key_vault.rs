//! Key Vault REST client: key provisioning and remote wrap/unwrap.
//!
//! Private key material never leaves the vault. [`CryptographyClient`] is a
//! handle on one vault key that satisfies [`KeyEncryptionKey`] by calling
//! the vault's `wrapkey` / `unwrapkey` operations, and
//! [`KeyVaultKeyResolver`] turns the key identifier recorded in blob
//! metadata back into such a handle.

use crate::config::CloudConfig;
use crate::credential::{KEY_VAULT_SCOPE, TokenCredential};
use crate::error::{CloudError, CloudResult};
use crate::http::check_status;
use crate::retry::RetryPolicy;
use crate::types::{KeyId, KeyType, KeyVaultKey};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use blobseal_crypto::{CryptoError, CryptoResult, KeyEncryptionKey, KeyResolver, KeyWrapAlgorithm};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// Key Vault data-plane API version.
pub const API_VERSION: &str = "7.4";

#[derive(Serialize)]
struct CreateKeyRequest {
    kty: KeyType,
    key_size: u32,
}

#[derive(Serialize)]
struct KeyOperationRequest<'a> {
    alg: &'a str,
    value: String,
}

#[derive(Deserialize)]
struct KeyOperationResult {
    value: String,
}

/// Client for one vault.
#[derive(Clone)]
pub struct KeyVaultClient {
    http: Client,
    vault_url: String,
    vault_origin: String,
    credentials: Arc<dyn TokenCredential>,
    retry: RetryPolicy,
}

impl KeyVaultClient {
    pub fn new(
        http: Client,
        vault_url: &str,
        credentials: Arc<dyn TokenCredential>,
        retry: RetryPolicy,
    ) -> CloudResult<Self> {
        let parsed = Url::parse(vault_url)
            .map_err(|e| CloudError::Config(format!("invalid vault URL {vault_url}: {e}")))?;

        Ok(Self {
            http,
            vault_url: vault_url.trim_end_matches('/').to_string(),
            vault_origin: parsed.origin().ascii_serialization(),
            credentials,
            retry,
        })
    }

    pub fn from_config(
        config: &CloudConfig,
        http: Client,
        credentials: Arc<dyn TokenCredential>,
    ) -> CloudResult<Self> {
        Self::new(http, &config.key_vault_url, credentials, config.retry.clone())
    }

    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    /// Sends one authorized request per attempt under the retry policy.
    async fn call<B, T>(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> CloudResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let method = &method;
        self.retry
            .run(operation, || async move {
                let token = self.credentials.get_token(KEY_VAULT_SCOPE).await?;
                let mut req = self
                    .http
                    .request(method.clone(), url)
                    .query(&[("api-version", API_VERSION)])
                    .bearer_auth(&token.token)
                    .header("x-ms-client-request-id", Uuid::new_v4().to_string());
                if let Some(body) = body {
                    req = req.json(body);
                }

                let resp = check_status(req.send().await?).await?;
                Ok(resp.json::<T>().await?)
            })
            .await
    }

    /// Creates a new key (or a new version of an existing one).
    pub async fn create_key(
        &self,
        name: &str,
        key_type: KeyType,
        key_size: u32,
    ) -> CloudResult<KeyVaultKey> {
        let url = format!("{}/keys/{name}/create", self.vault_url);
        let body = CreateKeyRequest {
            kty: key_type,
            key_size,
        };

        let key: KeyVaultKey = self
            .call("create key", Method::POST, &url, Some(&body))
            .await
            .map_err(|e| key_error(&format!("create key {name}"), e))?;

        info!("created key {} ({key_size}-bit)", key.key.kid);
        Ok(key)
    }

    /// Fetches a key by name; `None` selects the current version.
    pub async fn get_key(&self, name: &str, version: Option<&str>) -> CloudResult<KeyVaultKey> {
        let url = match version {
            Some(version) => format!("{}/keys/{name}/{version}", self.vault_url),
            None => format!("{}/keys/{name}", self.vault_url),
        };

        self.call::<(), _>("get key", Method::GET, &url, None)
            .await
            .map_err(|e| key_error(&format!("get key {name}"), e))
    }

    /// Fetches a key by its full identifier. The identifier must belong to
    /// this vault.
    pub async fn get_key_by_id(&self, kid: &str) -> CloudResult<KeyVaultKey> {
        let id = KeyId::parse(kid)?;
        if id.vault_url != self.vault_origin {
            return Err(CloudError::NotFound(format!(
                "key {kid} does not belong to vault {}",
                self.vault_url
            )));
        }

        self.get_key(&id.name, id.version.as_deref()).await
    }

    /// Wraps `key` under the vault key `kid`.
    pub async fn wrap_key(
        &self,
        kid: &str,
        algorithm: KeyWrapAlgorithm,
        key: &[u8],
    ) -> CloudResult<Vec<u8>> {
        let url = format!("{}/wrapkey", kid.trim_end_matches('/'));
        let body = KeyOperationRequest {
            alg: algorithm.as_str(),
            value: URL_SAFE_NO_PAD.encode(key),
        };

        let result: KeyOperationResult = self
            .call("wrap key", Method::POST, &url, Some(&body))
            .await
            .map_err(|e| key_error(&format!("{algorithm} wrap with {kid}"), e))?;

        debug!("wrapped {} bytes with {kid}", key.len());
        decode_value(&result.value)
    }

    /// Unwraps `wrapped` with the vault key `kid`. A request the vault
    /// rejects as malformed (400) means the wrapped key is not valid for
    /// this key and algorithm.
    pub async fn unwrap_key(
        &self,
        kid: &str,
        algorithm: KeyWrapAlgorithm,
        wrapped: &[u8],
    ) -> CloudResult<Vec<u8>> {
        let url = format!("{}/unwrapkey", kid.trim_end_matches('/'));
        let body = KeyOperationRequest {
            alg: algorithm.as_str(),
            value: URL_SAFE_NO_PAD.encode(wrapped),
        };

        let result: KeyOperationResult = self
            .call("unwrap key", Method::POST, &url, Some(&body))
            .await
            .map_err(|e| match e {
                CloudError::Status {
                    status: 400,
                    message,
                } => CloudError::Crypto(CryptoError::AuthenticationFailure(format!(
                    "{algorithm} unwrap rejected by {kid}: {message}"
                ))),
                other => key_error(&format!("{algorithm} unwrap with {kid}"), other),
            })?;

        debug!("unwrapped content key with {kid}");
        decode_value(&result.value)
    }

    /// Handle for wrap/unwrap operations on `key`.
    pub fn cryptography_client(&self, key: &KeyVaultKey) -> CryptographyClient {
        CryptographyClient {
            client: self.clone(),
            key_id: key.key.kid.clone(),
        }
    }
}

/// Maps a service rejection onto the key error vocabulary. Transport
/// errors pass through unchanged.
fn key_error(operation: &str, e: CloudError) -> CloudError {
    match e {
        CloudError::Status {
            status: 404,
            message,
        } => CloudError::NotFound(format!("{operation}: {message}")),
        CloudError::Status { status, message } => {
            CloudError::KeyOperation(format!("{operation} failed ({status}): {message}"))
        }
        other => other,
    }
}

fn decode_value(value: &str) -> CloudResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| CloudError::KeyOperation(format!("vault returned invalid base64url: {e}")))
}

fn to_crypto_error(e: CloudError) -> CryptoError {
    match e {
        CloudError::Crypto(inner) => inner,
        CloudError::NotFound(msg) => CryptoError::KeyNotFound(msg),
        other => CryptoError::KeyOperation(other.to_string()),
    }
}

/// A vault key usable as a key-encryption key.
#[derive(Clone)]
pub struct CryptographyClient {
    client: KeyVaultClient,
    key_id: String,
}

impl std::fmt::Debug for CryptographyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptographyClient")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyEncryptionKey for CryptographyClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn wrap_key(&self, algorithm: KeyWrapAlgorithm, key: &[u8]) -> CryptoResult<Vec<u8>> {
        self.client
            .wrap_key(&self.key_id, algorithm, key)
            .await
            .map_err(to_crypto_error)
    }

    async fn unwrap_key(
        &self,
        algorithm: KeyWrapAlgorithm,
        wrapped: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        self.client
            .unwrap_key(&self.key_id, algorithm, wrapped)
            .await
            .map_err(to_crypto_error)
    }
}

/// Resolves key identifiers by looking them up in the vault.
#[derive(Clone)]
pub struct KeyVaultKeyResolver {
    client: KeyVaultClient,
}

impl KeyVaultKeyResolver {
    pub fn new(client: KeyVaultClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyResolver for KeyVaultKeyResolver {
    async fn resolve(&self, key_id: &str) -> CryptoResult<Arc<dyn KeyEncryptionKey>> {
        if KeyId::parse(key_id).is_err() {
            return Err(CryptoError::KeyNotFound(format!("malformed key identifier: {key_id}")));
        }

        let key = self
            .client
            .get_key_by_id(key_id)
            .await
            .map_err(to_crypto_error)?;

        debug!("resolved {key_id} to {}", key.key.kid);
        Ok(Arc::new(self.client.cryptography_client(&key)))
    }
}
