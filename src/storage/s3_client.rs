// S3-compatible object store (AWS S3, MinIO, GCS interoperability endpoint)

use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use tracing::info;

use super::{ObjectStore, StorageError};
use crate::config::StorageConfig;

pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3ObjectStore {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid S3 region '{}': {}", config.s3_region, e)))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("S3 credentials unavailable: {}", e)))?;

        info!(region = %config.s3_region, custom_endpoint = config.s3_endpoint.is_some(), "S3 object store configured");

        Ok(Self {
            region,
            // Custom endpoints (MinIO and friends) expect path-style addressing
            path_style: config.s3_endpoint.is_some(),
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StorageError> {
        let mut bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if self.path_style {
            bucket = bucket.with_path_style();
        }
        Ok(Box::new(bucket))
    }
}

fn key(blob: &str) -> String {
    format!("/{}", blob.trim_start_matches('/'))
}

fn http_status(error: &S3Error) -> Option<u16> {
    match error {
        S3Error::HttpFailWithBody(code, _) => Some(*code),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_text(&self, bucket: &str, blob: &str, content: &str) -> Result<(), StorageError> {
        let handle = self.bucket(bucket)?;
        match handle
            .put_object_with_content_type(key(blob), content.as_bytes(), "text/plain")
            .await
        {
            Ok(response) if response.status_code() == 404 => Err(StorageError::BucketNotFound(bucket.to_string())),
            Ok(response) if response.status_code() >= 300 => Err(StorageError::Backend(format!(
                "S3 upload returned HTTP {}",
                response.status_code()
            ))),
            Ok(_) => Ok(()),
            Err(e) if http_status(&e) == Some(404) => Err(StorageError::BucketNotFound(bucket.to_string())),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn get_text(&self, bucket: &str, blob: &str) -> Result<String, StorageError> {
        let handle = self.bucket(bucket)?;
        match handle.get_object(key(blob)).await {
            Ok(response) if response.status_code() == 404 => Err(StorageError::BlobNotFound(blob.to_string())),
            Ok(response) if response.status_code() >= 300 => Err(StorageError::Backend(format!(
                "S3 download returned HTTP {}",
                response.status_code()
            ))),
            Ok(response) => String::from_utf8(response.bytes().to_vec())
                .map_err(|e| StorageError::Backend(format!("blob is not valid UTF-8: {}", e))),
            Err(e) if http_status(&e) == Some(404) => Err(StorageError::BlobNotFound(blob.to_string())),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn delete(&self, bucket: &str, blob: &str) -> Result<(), StorageError> {
        let handle = self.bucket(bucket)?;

        // S3 deletes of missing keys succeed silently; check first so callers see BLOB_NOT_FOUND
        match handle.head_object(key(blob)).await {
            Ok((_, 404)) => return Err(StorageError::BlobNotFound(blob.to_string())),
            Ok(_) => {}
            Err(e) if http_status(&e) == Some(404) => return Err(StorageError::BlobNotFound(blob.to_string())),
            Err(e) => return Err(StorageError::Backend(e.to_string())),
        }

        handle
            .delete_object(key(blob))
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("S3 object store ({})", self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_rooted() {
        assert_eq!(key("drafts/a.md"), "/drafts/a.md");
        assert_eq!(key("/a.md"), "/a.md");
    }

    #[test]
    fn test_custom_endpoint_uses_path_style() {
        let mut config = crate::config::Config::for_tests().storage;
        config.provider = "s3".to_string();
        config.s3_endpoint = Some("http://localhost:9000".to_string());
        config.s3_access_key_id = Some("minio".to_string());
        config.s3_secret_access_key = Some("minio-secret".to_string());

        let store = S3ObjectStore::from_config(&config).unwrap();
        assert!(store.path_style);
        assert!(store.bucket("drafts").is_ok());
    }
}
