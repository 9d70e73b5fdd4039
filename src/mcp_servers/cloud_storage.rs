//! Cloud storage tool server
//!
//! `upload_file`, `download_file` and `delete_file` on top of an
//! [`ObjectStore`]. Public URLs are `<public base>/<bucket>/<blob>`.

use axum::{extract::State, response::Response, routing::{get, post}, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::{decode_params, reply, tool_not_found};
use crate::config::Config;
use crate::protocol::mcp::{
    error_codes, DeleteFileParams, DownloadFileParams, MCPToolCall, MCPToolResult, UploadFileParams,
    TOOL_DELETE_FILE, TOOL_DOWNLOAD_FILE, TOOL_UPLOAD_FILE,
};
use crate::storage::{build_store, ObjectStore, StorageError};

#[derive(Clone)]
pub struct CloudStorageState {
    store: Option<Arc<dyn ObjectStore>>,
    public_base_url: String,
}

impl CloudStorageState {
    pub fn new(store: Option<Arc<dyn ObjectStore>>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// A store that fails to build leaves the server up but answering
    /// `STORAGE_NOT_INITIALIZED`.
    pub async fn from_config(config: &Config) -> Self {
        let buckets: Vec<String> = config.agents.bucket_name.iter().cloned().collect();
        let store = match build_store(&config.storage, &buckets).await {
            Ok(store) => {
                info!(store = %store.describe(), "Object store initialized");
                Some(store)
            }
            Err(e) => {
                error!(provider = %config.storage.provider, error = %e, "Object store failed to initialize");
                None
            }
        };
        Self::new(store, config.storage.public_base_url.clone())
    }

    pub fn public_url(&self, bucket: &str, blob: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, blob)
    }

    async fn upload_file(&self, store: &dyn ObjectStore, call: &MCPToolCall) -> MCPToolResult {
        let params: UploadFileParams = match decode_params(call) {
            Ok(params) => params,
            Err(failure) => return failure,
        };
        info!(bucket = %params.bucket_name, blob = %params.destination_blob_name, "Uploading file");

        match store
            .put_text(&params.bucket_name, &params.destination_blob_name, &params.source_file_content)
            .await
        {
            Ok(()) => {
                info!(bucket = %params.bucket_name, blob = %params.destination_blob_name, "Upload complete");
                MCPToolResult::success_json(json!({
                    "bucket": params.bucket_name,
                    "blob": params.destination_blob_name,
                    "public_url": self.public_url(&params.bucket_name, &params.destination_blob_name),
                }))
            }
            Err(StorageError::BucketNotFound(bucket)) => {
                error!(bucket = %bucket, "Bucket not found during upload");
                MCPToolResult::failure(
                    error_codes::BUCKET_NOT_FOUND,
                    format!(
                        "Cloud Storage bucket '{}' not found. Make sure the bucket exists and the credentials have access to it.",
                        bucket
                    ),
                )
            }
            Err(e) => {
                error!(error = %e, "Upload failed");
                MCPToolResult::failure(error_codes::UPLOAD_FAILED, format!("File upload failed: {}", e))
            }
        }
    }

    async fn download_file(&self, store: &dyn ObjectStore, call: &MCPToolCall) -> MCPToolResult {
        let params: DownloadFileParams = match decode_params(call) {
            Ok(params) => params,
            Err(failure) => return failure,
        };
        info!(bucket = %params.bucket_name, blob = %params.source_blob_name, "Downloading file");

        match store.get_text(&params.bucket_name, &params.source_blob_name).await {
            Ok(content) => MCPToolResult::success_json(json!({
                "bucket": params.bucket_name,
                "blob": params.source_blob_name,
                "content": content,
            })),
            Err(StorageError::BlobNotFound(_) | StorageError::BucketNotFound(_)) => MCPToolResult::failure(
                error_codes::BLOB_NOT_FOUND,
                format!("Blob '{}' not found.", params.source_blob_name),
            ),
            Err(e) => {
                error!(error = %e, "Download failed");
                MCPToolResult::failure(error_codes::DOWNLOAD_FAILED, format!("File download failed: {}", e))
            }
        }
    }

    async fn delete_file(&self, store: &dyn ObjectStore, call: &MCPToolCall) -> MCPToolResult {
        let params: DeleteFileParams = match decode_params(call) {
            Ok(params) => params,
            Err(failure) => return failure,
        };
        info!(bucket = %params.bucket_name, blob = %params.blob_name, "Deleting file");

        match store.delete(&params.bucket_name, &params.blob_name).await {
            Ok(()) => MCPToolResult::success_json(json!({
                "bucket": params.bucket_name,
                "blob": params.blob_name,
                "status": "deleted",
            })),
            Err(StorageError::BlobNotFound(_) | StorageError::BucketNotFound(_)) => MCPToolResult::failure(
                error_codes::BLOB_NOT_FOUND,
                format!("Blob '{}' not found.", params.blob_name),
            ),
            Err(e) => {
                error!(error = %e, "Delete failed");
                MCPToolResult::failure(error_codes::DELETE_FAILED, format!("File deletion failed: {}", e))
            }
        }
    }
}

pub fn router(state: CloudStorageState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/mcp/tool", post(call_tool))
        .with_state(state)
}

async fn read_root(State(state): State<CloudStorageState>) -> Json<Value> {
    let status = match &state.store {
        Some(store) => format!("Storage initialized ({}).", store.describe()),
        None => "Storage client failed to initialize.".to_string(),
    };
    Json(json!({ "message": format!("Cloud Storage MCP Server is running. {}", status) }))
}

async fn call_tool(State(state): State<CloudStorageState>, Json(call): Json<MCPToolCall>) -> Response {
    info!(tool = %call.tool_name, task_id = ?call.task_id, "MCP tool call received");

    let Some(store) = state.store.clone() else {
        error!("Storage operation requested but the store is not initialized");
        return reply(MCPToolResult::failure(
            error_codes::STORAGE_NOT_INITIALIZED,
            "Cloud Storage client is not initialized. Check server logs for credential errors.",
        ));
    };

    let result = match call.tool_name.as_str() {
        TOOL_UPLOAD_FILE => state.upload_file(store.as_ref(), &call).await,
        TOOL_DOWNLOAD_FILE => state.download_file(store.as_ref(), &call).await,
        TOOL_DELETE_FILE => state.delete_file(store.as_ref(), &call).await,
        other => return tool_not_found("cloud_storage", other),
    };
    reply(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn app_with_bucket(bucket: &str) -> Router {
        let store = MemoryObjectStore::default();
        store.create_bucket(bucket).await;
        router(CloudStorageState::new(
            Some(Arc::new(store)),
            "https://storage.googleapis.com/",
        ))
    }

    async fn call(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp/tool")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upload_download_delete() {
        let app = app_with_bucket("drafts").await;

        let (_, body) = call(
            app.clone(),
            json!({"tool_name": "upload_file", "parameters": {
                "bucket_name": "drafts",
                "destination_blob_name": "ferris.md",
                "source_file_content": "# Ferris"
            }}),
        )
        .await;
        assert_eq!(
            body["result"],
            json!({
                "bucket": "drafts",
                "blob": "ferris.md",
                "public_url": "https://storage.googleapis.com/drafts/ferris.md"
            })
        );

        let (_, body) = call(
            app.clone(),
            json!({"tool_name": "download_file", "parameters": {"bucket_name": "drafts", "source_blob_name": "ferris.md"}}),
        )
        .await;
        assert_eq!(body["result"]["content"], "# Ferris");

        let (_, body) = call(
            app.clone(),
            json!({"tool_name": "delete_file", "parameters": {"bucket_name": "drafts", "blob_name": "ferris.md"}}),
        )
        .await;
        assert_eq!(body["result"]["status"], "deleted");

        let (_, body) = call(
            app,
            json!({"tool_name": "delete_file", "parameters": {"bucket_name": "drafts", "blob_name": "ferris.md"}}),
        )
        .await;
        assert_eq!(body["error"]["code"], "BLOB_NOT_FOUND");
        assert_eq!(body["error"]["message"], "Blob 'ferris.md' not found.");
    }

    #[tokio::test]
    async fn test_upload_failures() {
        let app = app_with_bucket("drafts").await;

        let (_, body) = call(
            app.clone(),
            json!({"tool_name": "upload_file", "parameters": {
                "bucket_name": "missing",
                "destination_blob_name": "a.md",
                "source_file_content": "x"
            }}),
        )
        .await;
        assert_eq!(body["error"]["code"], "BUCKET_NOT_FOUND");

        let (_, body) = call(
            app,
            json!({"tool_name": "upload_file", "parameters": {"bucket_name": "drafts"}}),
        )
        .await;
        assert_eq!(body["error"]["code"], "INVALID_PARAMETERS");
    }

    #[tokio::test]
    async fn test_uninitialized_store_and_unknown_tool() {
        let app = router(CloudStorageState::new(None, "https://storage.googleapis.com"));
        let (status, body) = call(app, json!({"tool_name": "upload_file", "parameters": {}})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], "STORAGE_NOT_INITIALIZED");

        let app = app_with_bucket("drafts").await;
        let (status, body) = call(app, json!({"tool_name": "list_files"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"]["error"]["code"], "TOOL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_from_config_local_store_creates_bucket() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::for_tests();
        config.storage.provider = "local".to_string();
        config.storage.local_root = temp_dir.path().display().to_string();

        let state = CloudStorageState::from_config(&config).await;
        assert!(state.store.is_some());
        assert!(temp_dir.path().join("drafts").is_dir());
        assert_eq!(state.public_url("drafts", "a.md"), "https://storage.googleapis.com/drafts/a.md");
    }
}
