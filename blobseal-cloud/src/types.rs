//! Shared types for the Key Vault and blob storage clients.

use crate::error::{CloudError, CloudResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Bearer token for one scope.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Returns true if the token will expire within the given seconds.
    ///
    /// A window past the representable range covers every expiry.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        chrono::Duration::try_seconds(secs)
            .and_then(|window| Utc::now().checked_add_signed(window))
            .map_or(secs > 0, |horizon| horizon >= self.expires_at)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Key types Key Vault can create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "RSA-HSM")]
    RsaHsm,
}

/// Public portion of a vault key, as returned by the vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kid: String,
    pub kty: KeyType,
    #[serde(default)]
    pub key_ops: Vec<String>,
    /// RSA modulus, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeyAttributes {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Unix seconds.
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub updated: Option<i64>,
}

/// A key bundle from Key Vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyVaultKey {
    pub key: JsonWebKey,
    #[serde(default)]
    pub attributes: KeyAttributes,
}

impl KeyVaultKey {
    /// Parsed form of `key.kid`.
    pub fn id(&self) -> CloudResult<KeyId> {
        KeyId::parse(&self.key.kid)
    }
}

/// A parsed Key Vault key identifier:
/// `https://{vault}/keys/{name}/{version}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyId {
    pub vault_url: String,
    pub name: String,
    pub version: Option<String>,
}

impl KeyId {
    pub fn parse(kid: &str) -> CloudResult<Self> {
        let url = Url::parse(kid)
            .map_err(|e| CloudError::KeyOperation(format!("invalid key identifier {kid}: {e}")))?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (name, version) = match segments.as_slice() {
            ["keys", name] => (name.to_string(), None),
            ["keys", name, version] => (name.to_string(), Some(version.to_string())),
            _ => {
                return Err(CloudError::KeyOperation(format!(
                    "key identifier {kid} is not of the form <vault>/keys/<name>[/<version>]"
                )));
            }
        };

        Ok(Self {
            vault_url: url.origin().ascii_serialization(),
            name,
            version,
        })
    }

    /// Canonical identifier URL.
    pub fn url(&self) -> String {
        match &self.version {
            Some(version) => format!("{}/keys/{}/{version}", self.vault_url, self.name),
            None => format!("{}/keys/{}", self.vault_url, self.name),
        }
    }
}

/// Bytes plus user metadata of a stored object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}
