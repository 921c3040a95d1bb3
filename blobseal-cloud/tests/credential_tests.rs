mod support;

use blobseal_cloud::CloudError;
use blobseal_cloud::config::CloudConfig;
use blobseal_cloud::credential::{
    ClientSecretCredential, KEY_VAULT_SCOPE, STORAGE_SCOPE, TokenCredential,
};
use blobseal_cloud::credential_manager::CredentialManager;
use blobseal_cloud::http::build_client;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use support::StaticCredential;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credential_for(server: &MockServer) -> ClientSecretCredential {
    let config = support::test_config(server);
    let http = build_client(&config).unwrap();
    ClientSecretCredential::from_lookup(http, &config, support::credential_env).unwrap()
}

// --- Construction ---

#[tokio::test]
async fn each_missing_variable_is_named_and_nothing_is_sent() {
    let server = MockServer::start().await;
    support::mount_token_endpoint(&server).await;
    let config = support::test_config(&server);

    for missing in ["CLIENT_ID", "CLIENT_SECRET", "TENANT_ID"] {
        let lookup = |name: &str| {
            if name == missing {
                None
            } else {
                support::credential_env(name)
            }
        };
        let http = build_client(&config).unwrap();
        let err = ClientSecretCredential::from_lookup(http, &config, lookup).unwrap_err();
        match err {
            CloudError::MissingCredential(name) => assert_eq!(name, missing),
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_variable_counts_as_missing() {
    let config = CloudConfig::default();
    let lookup = |name: &str| match name {
        "CLIENT_SECRET" => Some("   ".to_string()),
        other => support::credential_env(other),
    };
    let err = ClientSecretCredential::from_lookup(build_client(&config).unwrap(), &config, lookup)
        .unwrap_err();
    assert!(matches!(err, CloudError::MissingCredential(ref n) if n == "CLIENT_SECRET"));
}

#[test]
fn debug_output_redacts_secret() {
    let config = CloudConfig::default();
    let cred = ClientSecretCredential::from_lookup(
        build_client(&config).unwrap(),
        &config,
        support::credential_env,
    )
    .unwrap();
    let debug = format!("{cred:?}");
    assert!(debug.contains("client-id"));
    assert!(!debug.contains("client-secret"));
    assert_eq!(cred.tenant_id(), support::TENANT);
}

// --- Token request ---

#[tokio::test]
async fn token_request_uses_client_credentials_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/v2.0/token", support::TENANT)))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=client-secret"))
        .and(body_string_contains("scope=https%3A%2F%2Fvault.azure.net%2F.default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "vault-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = credential_for(&server).get_token(KEY_VAULT_SCOPE).await.unwrap();
    assert_eq!(token.token, "vault-token");
    assert!(!token.is_expired());
    assert!(token.expires_within_secs(3600));
    assert!(!token.expires_within_secs(3000));
}

#[tokio::test]
async fn rejected_client_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let err = credential_for(&server).get_token(STORAGE_SCOPE).await.unwrap_err();
    match err {
        CloudError::AuthFailed(msg) => assert!(msg.contains("invalid_client"), "{msg}"),
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_token_response_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = credential_for(&server).get_token(STORAGE_SCOPE).await.unwrap_err();
    assert!(matches!(err, CloudError::AuthFailed(_)));
}

#[tokio::test]
async fn out_of_range_token_lifetime_is_auth_failure() {
    for expires_in in [9_000_000_000_000_i64, i64::MAX, i64::MIN] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "expires_in": expires_in,
                "access_token": "forever"
            })))
            .mount(&server)
            .await;

        let err = credential_for(&server).get_token(STORAGE_SCOPE).await.unwrap_err();
        match err {
            CloudError::AuthFailed(msg) => assert!(msg.contains("out of range"), "{msg}"),
            other => panic!("expected AuthFailed for {expires_in}, got {other:?}"),
        }
    }
}

#[test]
fn huge_refresh_window_covers_any_expiry() {
    let token = blobseal_cloud::AccessToken {
        token: "t".into(),
        expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
    };
    assert!(token.expires_within_secs(i64::MAX));
    assert!(!token.expires_within_secs(i64::MIN));
}

// --- Token cache ---

#[tokio::test]
async fn cached_token_is_reused() {
    let cred = Arc::new(StaticCredential::new(3600));
    let manager = CredentialManager::new(cred.clone(), 300);

    let first = manager.get_token(KEY_VAULT_SCOPE).await.unwrap();
    let second = manager.get_token(KEY_VAULT_SCOPE).await.unwrap();

    assert_eq!(first.token, second.token);
    assert_eq!(cred.calls(), 1);
    assert!(manager.has_valid_token(KEY_VAULT_SCOPE).await);
}

#[tokio::test]
async fn scopes_are_cached_separately() {
    let cred = Arc::new(StaticCredential::new(3600));
    let manager = CredentialManager::new(cred.clone(), 300);

    let vault = manager.get_token(KEY_VAULT_SCOPE).await.unwrap();
    let storage = manager.get_token(STORAGE_SCOPE).await.unwrap();

    assert_ne!(vault.token, storage.token);
    assert_eq!(cred.calls(), 2);
}

#[tokio::test]
async fn token_inside_refresh_margin_is_refreshed() {
    // Lifetime shorter than the margin: every lookup refreshes.
    let cred = Arc::new(StaticCredential::new(60));
    let manager = CredentialManager::new(cred.clone(), 300);

    manager.get_token(KEY_VAULT_SCOPE).await.unwrap();
    manager.get_token(KEY_VAULT_SCOPE).await.unwrap();

    assert_eq!(cred.calls(), 2);
    assert!(!manager.has_valid_token(KEY_VAULT_SCOPE).await);
}

#[tokio::test]
async fn clear_forces_refetch() {
    let cred = Arc::new(StaticCredential::new(3600));
    let manager = CredentialManager::new(cred.clone(), 300);

    manager.get_token(STORAGE_SCOPE).await.unwrap();
    manager.clear().await;
    assert!(!manager.has_valid_token(STORAGE_SCOPE).await);

    manager.get_token(STORAGE_SCOPE).await.unwrap();
    assert_eq!(cred.calls(), 2);
}

#[tokio::test]
async fn manager_over_real_credential_requests_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "expires_in": 3599,
            "access_token": "cached"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CredentialManager::new(Arc::new(credential_for(&server)), 300);
    for _ in 0..3 {
        assert_eq!(manager.get_token(KEY_VAULT_SCOPE).await.unwrap().token, "cached");
    }
}
