//! Token lifecycle management with auto-refresh.
//!
//! Caches one bearer token per scope, refreshing it before expiry through
//! the underlying credential.

use crate::credential::TokenCredential;
use crate::error::CloudResult;
use crate::types::AccessToken;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Manages bearer tokens with auto-refresh.
pub struct CredentialManager {
    credential: Arc<dyn TokenCredential>,
    tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    refresh_margin_secs: i64,
}

impl CredentialManager {
    pub fn new(credential: Arc<dyn TokenCredential>, refresh_margin_secs: i64) -> Self {
        Self {
            credential,
            tokens: Arc::new(RwLock::new(HashMap::new())),
            refresh_margin_secs,
        }
    }

    /// Gets a valid token for `scope`, refreshing if needed.
    pub async fn get_token(&self, scope: &str) -> CloudResult<AccessToken> {
        // Fast path: cached token still outside the refresh margin
        {
            let tokens = self.tokens.read().await;
            if let Some(token) = tokens.get(scope) {
                if !token.expires_within_secs(self.refresh_margin_secs) {
                    return Ok(token.clone());
                }
                debug!(
                    "token for {scope} expiring within {}s, refreshing",
                    self.refresh_margin_secs
                );
            }
        }

        self.refresh(scope).await
    }

    /// Forces a token refresh for `scope`.
    pub async fn refresh(&self, scope: &str) -> CloudResult<AccessToken> {
        let token = self.credential.get_token(scope).await.map_err(|e| {
            warn!("token refresh for {scope} failed: {e}");
            e
        })?;

        debug!("refreshed token for {scope}, expires at {}", token.expires_at);

        let mut tokens = self.tokens.write().await;
        tokens.insert(scope.to_string(), token.clone());

        Ok(token)
    }

    /// Drops every cached token.
    pub async fn clear(&self) {
        self.tokens.write().await.clear();
    }

    /// Returns true if a token for `scope` is cached and outside the margin.
    pub async fn has_valid_token(&self, scope: &str) -> bool {
        let tokens = self.tokens.read().await;
        tokens
            .get(scope)
            .is_some_and(|t| !t.expires_within_secs(self.refresh_margin_secs))
    }
}

#[async_trait]
impl TokenCredential for CredentialManager {
    async fn get_token(&self, scope: &str) -> CloudResult<AccessToken> {
        CredentialManager::get_token(self, scope).await
    }
}
