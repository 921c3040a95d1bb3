//! Azure Blob Storage transport over the REST API.
//!
//! Authenticates with bearer tokens for the storage scope. User metadata
//! travels as `x-ms-meta-*` headers.

use crate::blob_transport::BlobTransport;
use crate::config::CloudConfig;
use crate::credential::{STORAGE_SCOPE, TokenCredential};
use crate::error::{CloudError, CloudResult};
use crate::http::check_status;
use crate::retry::RetryPolicy;
use crate::types::StoredBlob;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Blob service REST version.
pub const STORAGE_API_VERSION: &str = "2021-08-06";

const META_PREFIX: &str = "x-ms-meta-";

pub struct AzureBlobTransport {
    http: Client,
    account_url: Url,
    credentials: Arc<dyn TokenCredential>,
    retry: RetryPolicy,
}

impl AzureBlobTransport {
    pub fn new(
        http: Client,
        account_url: &str,
        credentials: Arc<dyn TokenCredential>,
        retry: RetryPolicy,
    ) -> CloudResult<Self> {
        let account_url = Url::parse(account_url)
            .map_err(|e| CloudError::Config(format!("invalid storage account URL: {e}")))?;
        if account_url.cannot_be_a_base() {
            return Err(CloudError::Config(format!(
                "storage account URL cannot hold blob paths: {account_url}"
            )));
        }
        Ok(Self {
            http,
            account_url,
            credentials,
            retry,
        })
    }

    /// Transport for the Azure backend of `config`.
    pub fn from_config(
        config: &CloudConfig,
        account_url: &str,
        http: Client,
        credentials: Arc<dyn TokenCredential>,
    ) -> CloudResult<Self> {
        Self::new(http, account_url, credentials, config.retry.clone())
    }

    /// Blob URL with `container` and `name` percent-encoded as single path
    /// segments, so `?`, `#`, `%` and `/` never leak into the query or path.
    fn blob_url(&self, container: &str, name: &str) -> Url {
        let mut url = self.account_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(container).push(name);
        }
        url
    }

    async fn request(&self, method: Method, url: &Url) -> CloudResult<RequestBuilder> {
        let token = self.credentials.get_token(STORAGE_SCOPE).await?;
        Ok(self
            .http
            .request(method, url.clone())
            .bearer_auth(&token.token)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string())
            .header("x-ms-client-request-id", Uuid::new_v4().to_string()))
    }

    /// Runs `method` against the blob, mapping 404 to [`CloudError::NotFound`].
    async fn send(
        &self,
        operation: &str,
        method: Method,
        container: &str,
        name: &str,
    ) -> CloudResult<Response> {
        let url = self.blob_url(container, name);
        let (url, method) = (&url, &method);
        self.retry
            .run(operation, || async move {
                let req = self.request(method.clone(), url).await?;
                check_status(req.send().await?).await
            })
            .await
            .map_err(|e| not_found(e, container, name))
    }
}

fn not_found(e: CloudError, container: &str, name: &str) -> CloudError {
    match e {
        CloudError::Status { status: 404, .. } => {
            CloudError::NotFound(format!("{container}/{name}"))
        }
        other => other,
    }
}

fn metadata_from_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(META_PREFIX)?;
            let value = value.to_str().ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl BlobTransport for AzureBlobTransport {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        metadata: &BTreeMap<String, String>,
    ) -> CloudResult<()> {
        let url = self.blob_url(container, name);
        let size = data.len();
        let (url, data) = (&url, &data);

        self.retry
            .run("upload blob", || async move {
                let mut req = self
                    .request(Method::PUT, url)
                    .await?
                    .header("x-ms-blob-type", "BlockBlob")
                    .header("content-type", "application/octet-stream");
                for (key, value) in metadata {
                    req = req.header(format!("{META_PREFIX}{key}"), value);
                }

                check_status(req.body(data.clone()).send().await?).await?;
                Ok(())
            })
            .await
            .map_err(|e| match e {
                CloudError::Status { status, message } => CloudError::Storage(format!(
                    "upload of {container}/{name} failed ({status}): {message}"
                )),
                other => other,
            })?;

        debug!("uploaded {size} bytes to {container}/{name}");
        Ok(())
    }

    async fn download(&self, container: &str, name: &str) -> CloudResult<StoredBlob> {
        let resp = self.send("download blob", Method::GET, container, name).await?;
        let metadata = metadata_from_headers(resp.headers());
        let data = resp.bytes().await?.to_vec();

        debug!("downloaded {} bytes from {container}/{name}", data.len());
        Ok(StoredBlob { data, metadata })
    }

    async fn exists(&self, container: &str, name: &str) -> CloudResult<bool> {
        match self.send("head blob", Method::HEAD, container, name).await {
            Ok(_) => Ok(true),
            Err(CloudError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, container: &str, name: &str) -> CloudResult<()> {
        self.send("delete blob", Method::DELETE, container, name).await?;
        debug!("deleted {container}/{name}");
        Ok(())
    }
}
