//! Shared helpers: mock identity, Key Vault and Blob endpoints.
//!
//! The fake vault performs real RSA operations with locally held keys, so
//! content keys wrapped through it can only be unwrapped through it.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use blobseal_cloud::config::{CloudConfig, StorageBackend};
use blobseal_cloud::credential::TokenCredential;
use blobseal_cloud::retry::RetryPolicy;
use blobseal_cloud::{AccessToken, CloudResult};
use blobseal_crypto::{KeyWrapAlgorithm, LocalRsaKey};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TENANT: &str = "test-tenant";
pub const KEY_VERSION: &str = "0123456789abcdef";
pub const CONTAINER: &str = "blogdata";
pub const BLOB: &str = "BY-DEMO-ENCRYPTED-BLOB";

/// One RSA-2048 key per test binary; generation is slow.
pub fn rsa_key() -> &'static LocalRsaKey {
    static KEY: OnceLock<LocalRsaKey> = OnceLock::new();
    KEY.get_or_init(|| LocalRsaKey::generate("local", 2048).unwrap())
}

pub fn other_rsa_key() -> &'static LocalRsaKey {
    static KEY: OnceLock<LocalRsaKey> = OnceLock::new();
    KEY.get_or_init(|| LocalRsaKey::generate("other", 2048).unwrap())
}

/// Retry policy with millisecond delays.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 2,
    }
}

/// Config pointing every service at `server`.
pub fn test_config(server: &MockServer) -> CloudConfig {
    CloudConfig {
        key_vault_url: server.uri(),
        storage: StorageBackend::Azure {
            account_url: server.uri(),
        },
        authority_host: server.uri(),
        retry: fast_retry(),
        request_timeout_secs: 5,
        ..CloudConfig::default()
    }
}

/// Environment lookup with the three credential variables set.
pub fn credential_env(name: &str) -> Option<String> {
    match name {
        "CLIENT_ID" => Some("client-id".into()),
        "CLIENT_SECRET" => Some("client-secret".into()),
        "TENANT_ID" => Some(TENANT.into()),
        _ => None,
    }
}

/// Fixed token credential that counts requests.
#[derive(Default)]
pub struct StaticCredential {
    pub calls: AtomicUsize,
    pub lifetime_secs: i64,
}

impl StaticCredential {
    pub fn new(lifetime_secs: i64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            lifetime_secs,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenCredential for StaticCredential {
    async fn get_token(&self, scope: &str) -> CloudResult<AccessToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken {
            token: format!("token-{n}-{scope}"),
            expires_at: Utc::now() + Duration::seconds(self.lifetime_secs),
        })
    }
}

pub fn static_credential() -> Arc<dyn TokenCredential> {
    Arc::new(StaticCredential::new(3600))
}

/// Mounts the client-credentials token endpoint.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/[^/]+/oauth2/v2\.0/token$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "mock-access-token"
        })))
        .mount(server)
        .await;
}

fn vault_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": { "code": code, "message": message }
    }))
}

/// In-process stand-in for the Key Vault keys API.
#[derive(Clone, Default)]
pub struct FakeVault {
    keys: Arc<Mutex<HashMap<String, LocalRsaKey>>>,
}

impl FakeVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-provisions `name` with `key`.
    pub fn with_key(self, name: &str, key: &LocalRsaKey) -> Self {
        self.keys.lock().unwrap().insert(name.to_string(), key.clone());
        self
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(path_regex(r"^/keys/"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    fn bundle(origin: &str, name: &str) -> Value {
        json!({
            "key": {
                "kid": format!("{origin}/keys/{name}/{KEY_VERSION}"),
                "kty": "RSA",
                "key_ops": ["wrapKey", "unwrapKey"],
            },
            "attributes": { "enabled": true, "created": 1_700_000_000, "updated": 1_700_000_000 }
        })
    }

    fn key_operation(
        &self,
        key: &LocalRsaKey,
        op: &str,
        request: &Request,
        kid: String,
    ) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return vault_error(400, "BadParameter", "malformed body");
        };
        let Ok(alg) = body["alg"].as_str().unwrap_or_default().parse::<KeyWrapAlgorithm>() else {
            return vault_error(400, "BadParameter", "unsupported algorithm");
        };
        let Ok(value) = URL_SAFE_NO_PAD.decode(body["value"].as_str().unwrap_or_default()) else {
            return vault_error(400, "BadParameter", "value is not base64url");
        };

        let result = match op {
            "wrapkey" => key.wrap(alg, &value),
            _ => key.unwrap(alg, &value),
        };
        match result {
            Ok(out) => ResponseTemplate::new(200).set_body_json(json!({
                "kid": kid,
                "value": URL_SAFE_NO_PAD.encode(out),
            })),
            Err(_) => vault_error(400, "BadParameter", "The parameter is incorrect."),
        }
    }
}

impl Respond for FakeVault {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let authorized = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Bearer "));
        if !authorized {
            return vault_error(401, "Unauthorized", "missing bearer token");
        }

        let origin = request.url.origin().ascii_serialization();
        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let verb = request.method.as_str();

        match (verb, segments.as_slice()) {
            ("POST", ["keys", name, "create"]) => {
                let mut keys = self.keys.lock().unwrap();
                keys.entry(name.to_string()).or_insert_with(|| rsa_key().clone());
                ResponseTemplate::new(200).set_body_json(Self::bundle(&origin, name))
            }
            ("GET", ["keys", name]) | ("GET", ["keys", name, _]) => {
                if self.keys.lock().unwrap().contains_key(*name) {
                    ResponseTemplate::new(200).set_body_json(Self::bundle(&origin, name))
                } else {
                    let message =
                        format!("A key with (name/id) {name} was not found in this key vault.");
                    vault_error(404, "KeyNotFound", &message)
                }
            }
            ("POST", ["keys", name, version, op @ ("wrapkey" | "unwrapkey")]) => {
                let key = self.keys.lock().unwrap().get(*name).cloned();
                match key {
                    Some(key) => {
                        let kid = format!("{origin}/keys/{name}/{version}");
                        self.key_operation(&key, op, request, kid)
                    }
                    None => vault_error(404, "KeyNotFound", "key not found"),
                }
            }
            _ => vault_error(400, "BadParameter", "unsupported route"),
        }
    }
}

/// In-process stand-in for the Blob service.
#[derive(Clone, Default)]
pub struct FakeBlobStore {
    blobs: Arc<Mutex<HashMap<String, (Vec<u8>, Vec<(String, String)>)>>>,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mount(&self, server: &MockServer, container: &str) {
        Mock::given(path_regex(format!("^/{container}/")))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    /// Raw bytes stored under `path` (e.g. `/blogdata/name`).
    pub fn stored(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(path).map(|(data, _)| data.clone())
    }

    pub fn stored_metadata(&self, path: &str, key: &str) -> Option<String> {
        self.blobs.lock().unwrap().get(path).and_then(|(_, meta)| {
            meta.iter()
                .find(|(k, _)| k == &format!("x-ms-meta-{key}"))
                .map(|(_, v)| v.clone())
        })
    }
}

impl Respond for FakeBlobStore {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        let mut blobs = self.blobs.lock().unwrap();

        match request.method.as_str() {
            "PUT" => {
                let meta = request
                    .headers
                    .iter()
                    .filter(|(name, _)| name.as_str().starts_with("x-ms-meta-"))
                    .filter_map(|(name, value)| {
                        Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
                    })
                    .collect();
                blobs.insert(path, (request.body.clone(), meta));
                ResponseTemplate::new(201)
            }
            "GET" | "HEAD" => match blobs.get(&path) {
                Some((data, meta)) => {
                    let mut resp = ResponseTemplate::new(200);
                    for (name, value) in meta {
                        resp = resp.insert_header(name.as_str(), value.as_str());
                    }
                    if request.method.as_str() == "GET" {
                        resp = resp.set_body_bytes(data.clone());
                    }
                    resp
                }
                None => ResponseTemplate::new(404),
            },
            "DELETE" => match blobs.remove(&path) {
                Some(_) => ResponseTemplate::new(202),
                None => ResponseTemplate::new(404),
            },
            _ => ResponseTemplate::new(405),
        }
    }
}
