//! Filesystem-backed object store
//!
//! Buckets are directories under a root, blobs are files inside them.
//! Blob names may contain `/` to form sub-directories.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{ObjectStore, StorageError};

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let dir = self.bucket_dir(bucket)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::Backend(format!("cannot create bucket directory: {}", e)))
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        check_relative(bucket)?;
        Ok(self.root.join(bucket))
    }

    async fn existing_bucket(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        let dir = self.bucket_dir(bucket)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            _ => Err(StorageError::BucketNotFound(bucket.to_string())),
        }
    }

    async fn blob_path(&self, bucket: &str, blob: &str) -> Result<PathBuf, StorageError> {
        check_relative(blob)?;
        Ok(self.existing_bucket(bucket).await?.join(blob))
    }
}

/// Only plain relative names; no `..`, no absolute paths.
fn check_relative(name: &str) -> Result<(), StorageError> {
    let path = Path::new(name);
    let valid = !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StorageError::Backend(format!("invalid object name: {}", name)))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_text(&self, bucket: &str, blob: &str, content: &str) -> Result<(), StorageError> {
        let path = self.blob_path(bucket, blob).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        fs::write(&path, content.as_bytes())
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        debug!(path = %path.display(), bytes = content.len(), "Wrote blob");
        Ok(())
    }

    async fn get_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError> {
        let path = self.blob_path(bucket, blob).await?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::BlobNotFound(blob.to_string())),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn delete(&self, bucket: &str, blob: &str) -> Result<(), StorageError> {
        let path = self.blob_path(bucket, blob).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::BlobNotFound(blob.to_string())),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("local object store at {}", self.root.display())
    }
}
