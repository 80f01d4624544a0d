//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.
//! It is the only seam between the pipeline and the object store.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use pixdrop_core::StoredObject;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    /// A conditional write lost a race: the object changed (or appeared) since it was read.
    #[error("Precondition failed for key: {0}")]
    PreconditionFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Operation not supported by this backend: {0}")]
    Unsupported(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object body together with the metadata returned by a read.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: Option<String>,
    /// Version tag usable with [`Storage::put_if_match`].
    pub e_tag: Option<String>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<StoredObject>,
    /// Opaque token for the next page; `None` when the listing is exhausted.
    pub next_token: Option<String>,
}

/// Outcome of a bulk delete. Keys that were already absent count as deleted.
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem, in-memory) implement this trait.
/// Keys are flat strings; the first path segment encodes the object's role
/// (`uploads/`, `processed/`, `thumbnails/`, `stats/`).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read an object. Missing keys yield [`StorageError::NotFound`].
    async fn get(&self, key: &str) -> StorageResult<StoredBlob>;

    /// Unconditionally write an object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Write an object only if its current version matches `expected_e_tag`.
    ///
    /// `None` means "only if the key does not exist yet". A lost race yields
    /// [`StorageError::PreconditionFailed`]. Backends without conditional writes
    /// return [`StorageError::Unsupported`].
    async fn put_if_match(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        expected_e_tag: Option<&str>,
    ) -> StorageResult<()>;

    /// Whether [`Storage::put_if_match`] is available.
    fn supports_conditional_put(&self) -> bool;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete several keys in a single call where the backend allows it.
    ///
    /// Callers keep batches at or below `MAX_DELETE_BATCH` keys.
    async fn delete_many(&self, keys: &[String]) -> StorageResult<DeleteReport>;

    /// List objects under `prefix`, one page at a time, in lexicographic key order.
    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StorageResult<ListPage>;

    /// Generate a time-limited GET URL for direct client access.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Drain every page of a prefix listing.
///
/// Taking the whole snapshot first keeps callers that mutate the prefix from
/// invalidating the continuation token mid-listing.
pub async fn list_all(storage: &dyn Storage, prefix: &str) -> StorageResult<Vec<StoredObject>> {
    let mut objects = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = storage.list_page(prefix, token.as_deref()).await?;
        objects.extend(page.objects);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(objects)
}

impl From<StorageError> for pixdrop_core::AppError {
    fn from(err: StorageError) -> Self {
        use pixdrop_core::AppError;
        match err {
            StorageError::NotFound(key) => AppError::NotFound(key),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::PreconditionFailed(key) => {
                AppError::Conflict(format!("Object changed concurrently: {}", key))
            }
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}
