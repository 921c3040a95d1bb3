//! Shared reqwest plumbing.

use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

/// Longest service message kept in an error.
const MAX_MESSAGE_LEN: usize = 512;

/// Builds the HTTP client shared by every service client.
pub fn build_client(config: &CloudConfig) -> CloudResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(concat!("blobseal/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    error: ServiceErrorDetail,
}

/// Key Vault shape: `{"error": {"code", "message"}}`.
#[derive(Deserialize)]
struct ServiceErrorDetail {
    code: String,
    message: String,
}

/// Identity platform shape: `{"error": "code", "error_description": "..."}`.
#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

fn service_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<OAuthErrorBody>(body) {
        return match parsed.error_description {
            Some(desc) => format!("{}: {desc}", parsed.error),
            None => parsed.error,
        };
    }
    if let Ok(parsed) = serde_json::from_str::<ServiceErrorBody>(body) {
        return format!("{}: {}", parsed.error.code, parsed.error.message);
    }

    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Turns a non-success response into [`CloudError::Status`].
pub async fn check_status(resp: Response) -> CloudResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no response body").to_string()
    } else {
        service_message(&body)
    };

    Err(CloudError::Status {
        status: status.as_u16(),
        message,
    })
}
