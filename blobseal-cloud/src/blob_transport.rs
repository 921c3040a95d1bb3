//! Storage seam for encrypted objects.

use crate::error::{CloudError, CloudResult};
use crate::types::StoredBlob;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Whole-object storage with user metadata.
///
/// Uploads overwrite. Downloading a missing object is [`CloudError::NotFound`].
#[async_trait]
pub trait BlobTransport: Send + Sync {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        metadata: &BTreeMap<String, String>,
    ) -> CloudResult<()>;

    async fn download(&self, container: &str, name: &str) -> CloudResult<StoredBlob>;

    async fn exists(&self, container: &str, name: &str) -> CloudResult<bool>;

    async fn delete(&self, container: &str, name: &str) -> CloudResult<()>;
}

/// Process-local transport.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    blobs: Arc<RwLock<HashMap<(String, String), StoredBlob>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a stored object as-is, bypassing the upload path.
    pub async fn put_raw(&self, container: &str, name: &str, blob: StoredBlob) {
        self.blobs
            .write()
            .await
            .insert((container.to_string(), name.to_string()), blob);
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobTransport for InMemoryTransport {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        metadata: &BTreeMap<String, String>,
    ) -> CloudResult<()> {
        let blob = StoredBlob {
            data,
            metadata: metadata.clone(),
        };
        self.put_raw(container, name, blob).await;
        Ok(())
    }

    async fn download(&self, container: &str, name: &str) -> CloudResult<StoredBlob> {
        self.blobs
            .read()
            .await
            .get(&(container.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("{container}/{name}")))
    }

    async fn exists(&self, container: &str, name: &str) -> CloudResult<bool> {
        Ok(self
            .blobs
            .read()
            .await
            .contains_key(&(container.to_string(), name.to_string())))
    }

    async fn delete(&self, container: &str, name: &str) -> CloudResult<()> {
        self.blobs
            .write()
            .await
            .remove(&(container.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("{container}/{name}")))
    }
}
