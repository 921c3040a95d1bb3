//! Client-credentials authentication against the identity platform.
//!
//! The credential is read from `CLIENT_ID`, `CLIENT_SECRET` and `TENANT_ID`
//! once, up front. A missing variable fails construction, so nothing is sent
//! over the network with a half-configured identity.

use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::http::check_status;
use crate::types::AccessToken;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Token scope for Key Vault data-plane calls.
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Token scope for Blob Storage data-plane calls.
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

pub const CLIENT_ID_VAR: &str = "CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET";
pub const TENANT_ID_VAR: &str = "TENANT_ID";

/// Source of bearer tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> CloudResult<AccessToken>;
}

/// Service principal identity: client id, client secret and tenant.
pub struct ClientSecretCredential {
    http: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    expires_in: i64,
}

impl ClientSecretCredential {
    pub fn new(
        http: Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into().trim_end_matches('/').to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads the identity from the process environment.
    pub fn from_env(http: Client, config: &CloudConfig) -> CloudResult<Self> {
        Self::from_lookup(http, config, |name| std::env::var(name).ok())
    }

    /// Reads the identity through `lookup`. Fails with
    /// [`CloudError::MissingCredential`] naming the first variable that is
    /// unset or empty.
    pub fn from_lookup<F>(http: Client, config: &CloudConfig, lookup: F) -> CloudResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CloudError::MissingCredential(name.to_string()))
        };

        let client_id = require(CLIENT_ID_VAR)?;
        let client_secret = require(CLIENT_SECRET_VAR)?;
        let tenant_id = require(TENANT_ID_VAR)?;

        Ok(Self::new(
            http,
            config.authority_host.as_str(),
            tenant_id,
            client_id,
            client_secret,
        ))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, self.tenant_id)
    }
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("authority_host", &self.authority_host)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> CloudResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let resp = self
            .http
            .post(self.token_url())
            .form(&form)
            .send()
            .await?;

        let resp = check_status(resp).await.map_err(|e| match e {
            CloudError::Status { status, message } if status < 500 => {
                CloudError::AuthFailed(format!("token request rejected ({status}): {message}"))
            }
            other => other,
        })?;

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CloudError::AuthFailed(format!("malformed token response: {e}")))?;

        let expires_at = chrono::Duration::try_seconds(body.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| CloudError::AuthFailed("token lifetime out of range".into()))?;

        debug!("acquired token for {scope}, valid for {}s", body.expires_in);

        Ok(AccessToken {
            token: body.access_token,
            expires_at,
        })
    }
}
