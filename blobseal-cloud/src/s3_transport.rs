//! S3 upload/download operations with static access keys.
//!
//! Alternative to the Azure backend for S3-compatible stores. The container
//! name is used as the bucket; user metadata travels as S3 object metadata.

use crate::blob_transport::BlobTransport;
use crate::error::{CloudError, CloudResult};
use crate::types::StoredBlob;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::BTreeMap;
use tracing::debug;

/// Static S3 credentials.
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl S3Credentials {
    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
    /// `AWS_SESSION_TOKEN`.
    pub fn from_env() -> CloudResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CloudResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require =
            |name: &str| get(name).ok_or_else(|| CloudError::MissingCredential(name.to_string()));

        Ok(Self {
            access_key_id: require("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            session_token: get("AWS_SESSION_TOKEN"),
        })
    }
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// S3 transport for uploading/downloading encrypted data.
pub struct S3Transport {
    client: S3Client,
}

impl S3Transport {
    pub fn new(
        credentials: &S3Credentials,
        region: String,
        endpoint_override: Option<String>,
    ) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            credentials.session_token.clone(),
            None,
            "blobseal-static",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(region))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(endpoint) = endpoint_override {
            config_builder = config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(config_builder.build()),
        }
    }
}

#[async_trait]
impl BlobTransport for S3Transport {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        metadata: &BTreeMap<String, String>,
    ) -> CloudResult<()> {
        let size = data.len();

        self.client
            .put_object()
            .bucket(container)
            .key(name)
            .set_metadata(Some(metadata.clone().into_iter().collect()))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| CloudError::Storage(format!("upload failed for {name}: {e}")))?;

        debug!("uploaded {size} bytes to s3://{container}/{name}");
        Ok(())
    }

    async fn download(&self, container: &str, name: &str) -> CloudResult<StoredBlob> {
        let resp = match self.client.get_object().bucket(container).key(name).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    return Err(CloudError::NotFound(format!("s3://{container}/{name}")));
                }
                return Err(CloudError::Storage(format!(
                    "download failed for {name}: {service_err}"
                )));
            }
        };

        let metadata = resp
            .metadata()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| CloudError::Storage(format!("failed to read body for {name}: {e}")))?;

        let data = body.into_bytes().to_vec();
        debug!("downloaded {} bytes from s3://{container}/{name}", data.len());
        Ok(StoredBlob { data, metadata })
    }

    /// HEAD request.
    async fn exists(&self, container: &str, name: &str) -> CloudResult<bool> {
        match self.client.head_object().bucket(container).key(name).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(CloudError::Storage(format!(
                        "head object failed for {name}: {service_err}"
                    )))
                }
            }
        }
    }

    async fn delete(&self, container: &str, name: &str) -> CloudResult<()> {
        self.client
            .delete_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .map_err(|e| CloudError::Storage(format!("delete failed for {name}: {e}")))?;

        debug!("deleted s3://{container}/{name}");
        Ok(())
    }
}
