//! Thread-safe registry of key-encryption keys by identifier.
//!
//! Decryption resolves the KEK named in blob metadata through this registry.
//! Keys are registered up front, or fetched through an optional fallback
//! resolver on first use and cached afterwards.

use async_trait::async_trait;
use blobseal_crypto::{CryptoError, CryptoResult, KeyEncryptionKey, KeyResolver};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Default)]
pub struct KeyRegistry {
    keys: Arc<RwLock<HashMap<String, Arc<dyn KeyEncryptionKey>>>>,
    fallback: Option<Arc<dyn KeyResolver>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that asks `fallback` for identifiers it does not hold.
    pub fn with_fallback(fallback: Arc<dyn KeyResolver>) -> Self {
        Self {
            keys: Arc::default(),
            fallback: Some(fallback),
        }
    }

    /// Registers a KEK under its own identifier.
    pub async fn insert(&self, key: Arc<dyn KeyEncryptionKey>) {
        let key_id = key.key_id().to_string();
        self.keys.write().await.insert(key_id, key);
    }

    pub async fn remove(&self, key_id: &str) -> Option<Arc<dyn KeyEncryptionKey>> {
        self.keys.write().await.remove(key_id)
    }

    pub async fn contains(&self, key_id: &str) -> bool {
        self.keys.read().await.contains_key(key_id)
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl KeyResolver for KeyRegistry {
    async fn resolve(&self, key_id: &str) -> CryptoResult<Arc<dyn KeyEncryptionKey>> {
        if let Some(key) = self.keys.read().await.get(key_id) {
            return Ok(Arc::clone(key));
        }

        let Some(fallback) = &self.fallback else {
            return Err(CryptoError::KeyNotFound(format!("no key registered for {key_id}")));
        };

        let key = fallback.resolve(key_id).await?;
        debug!("caching resolved key {key_id}");
        self.keys
            .write()
            .await
            .insert(key_id.to_string(), Arc::clone(&key));
        Ok(key)
    }
}
