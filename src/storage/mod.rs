// Object storage behind the cloud storage tool server
// Backends: S3-compatible (rust-s3), local filesystem, in-memory

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::StorageConfig;

pub mod local;
pub mod s3_client;

pub use local::LocalObjectStore;
pub use s3_client::S3ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("bucket '{0}' not found")]
    BucketNotFound(String),

    #[error("blob '{0}' not found")]
    BlobNotFound(String),

    #[error("{0}")]
    Backend(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store UTF-8 text as `text/plain`, replacing any existing blob.
    async fn put_text(&self, bucket: &str, blob: &str, content: &str) -> Result<(), StorageError>;

    async fn get_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError>;

    async fn delete(&self, bucket: &str, blob: &str) -> Result<(), StorageError>;

    /// Short human-readable description for liveness messages.
    fn describe(&self) -> String;
}

/// Build the store selected by `STORAGE_PROVIDER`.
pub async fn build_store(
    config: &StorageConfig,
    known_buckets: &[String],
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.provider.to_lowercase().as_str() {
        "s3" => Ok(Arc::new(S3ObjectStore::from_config(config)?)),
        "local" => {
            let store = LocalObjectStore::new(&config.local_root);
            for bucket in known_buckets {
                store.create_bucket(bucket).await?;
            }
            Ok(Arc::new(store))
        }
        "memory" => {
            let store = MemoryObjectStore::default();
            for bucket in known_buckets {
                store.create_bucket(bucket).await;
            }
            Ok(Arc::new(store))
        }
        other => Err(StorageError::Backend(format!("Unsupported storage provider: {}", other))),
    }
}

/// Volatile store; buckets must be created before use.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl MemoryObjectStore {
    pub async fn create_bucket(&self, bucket: &str) {
        let mut guard = self.buckets.write().await;
        guard.entry(bucket.to_string()).or_default();
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_text(&self, bucket: &str, blob: &str, content: &str) -> Result<(), StorageError> {
        let mut guard = self.buckets.write().await;
        let objects = guard
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects.insert(blob.to_string(), content.to_string());
        Ok(())
    }

    async fn get_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError> {
        let guard = self.buckets.read().await;
        guard
            .get(bucket)
            .and_then(|objects| objects.get(blob))
            .cloned()
            .ok_or_else(|| StorageError::BlobNotFound(blob.to_string()))
    }

    async fn delete(&self, bucket: &str, blob: &str) -> Result<(), StorageError> {
        let mut guard = self.buckets.write().await;
        guard
            .get_mut(bucket)
            .and_then(|objects| objects.remove(blob))
            .map(|_| ())
            .ok_or_else(|| StorageError::BlobNotFound(blob.to_string()))
    }

    fn describe(&self) -> String {
        "in-memory object store".to_string()
    }
}
