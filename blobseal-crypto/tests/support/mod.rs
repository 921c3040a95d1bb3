//! Shared test helpers: cached RSA keys and a map-backed resolver.

#![allow(dead_code)]

use async_trait::async_trait;
use blobseal_crypto::{CryptoError, CryptoResult, KeyEncryptionKey, KeyResolver, LocalRsaKey};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub const KEY_ID: &str = "https://unit-test.vault.local/keys/kek/v1";
pub const OTHER_KEY_ID: &str = "https://unit-test.vault.local/keys/other/v1";

/// RSA-2048 generation is slow; every test in a binary shares one key.
pub fn kek() -> LocalRsaKey {
    static KEK: OnceLock<LocalRsaKey> = OnceLock::new();
    KEK.get_or_init(|| LocalRsaKey::generate(KEY_ID, 2048).expect("key generation must succeed"))
        .clone()
}

pub fn other_kek() -> LocalRsaKey {
    static KEK: OnceLock<LocalRsaKey> = OnceLock::new();
    KEK.get_or_init(|| {
        LocalRsaKey::generate(OTHER_KEY_ID, 2048).expect("key generation must succeed")
    })
    .clone()
}

/// Resolver over a fixed set of keys.
#[derive(Default)]
pub struct MapResolver {
    keys: HashMap<String, Arc<dyn KeyEncryptionKey>>,
}

impl MapResolver {
    pub fn with(mut self, key: impl KeyEncryptionKey + 'static) -> Self {
        self.keys.insert(key.key_id().to_string(), Arc::new(key));
        self
    }
}

#[async_trait]
impl KeyResolver for MapResolver {
    async fn resolve(&self, key_id: &str) -> CryptoResult<Arc<dyn KeyEncryptionKey>> {
        self.keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| CryptoError::KeyNotFound(format!("no key registered for {key_id}")))
    }
}

pub fn resolver() -> MapResolver {
    MapResolver::default().with(kek())
}
