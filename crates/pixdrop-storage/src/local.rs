use crate::traits::{DeleteReport, ListPage, Storage, StorageError, StorageResult, StoredBlob};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use pixdrop_core::constants::DEFAULT_CONTENT_TYPE;
use pixdrop_core::StoredObject;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Intended for development. Writes are last-writer-wins and there is no conditional put.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    page_size: usize,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/pixdrop/bucket")
    /// * `base_url` - Base URL the root is served from (e.g., "http://localhost:4000/files")
    /// * `page_size` - Maximum number of objects returned per listing page
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        page_size: usize,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            page_size: page_size.max(1),
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that could escape the base storage directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Generate public URL for an object
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Every file below the root, as `(key, path)` sorted by key.
    async fn walk(&self) -> StorageResult<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::ListFailed(e.to_string())),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::ListFailed(e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(key) = self.path_to_key(&path) {
                        files.push((key, path));
                    }
                }
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    async fn describe(&self, key: String, path: &Path) -> StorageResult<StoredObject> {
        let metadata = fs::metadata(path).await?;
        let last_modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let e_tag = format!(
            "\"{:x}-{:x}\"",
            last_modified.timestamp_nanos_opt().unwrap_or_default(),
            metadata.len()
        );
        Ok(StoredObject {
            content_type: Some(content_type_for(&key).to_string()),
            size: metadata.len(),
            last_modified,
            e_tag: Some(e_tag),
            key,
        })
    }
}

/// Content type guessed from the key's extension.
fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit('.').next().unwrap_or_default().to_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "json" => "application/json",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get(&self, key: &str) -> StorageResult<StoredBlob> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    "Failed to read local file"
                );
                StorageError::DownloadFailed(e.to_string())
            }
        })?;

        let described = self.describe(key.to_string(), &path).await?;

        tracing::debug!(
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local read successful"
        );

        Ok(StoredBlob {
            data: Bytes::from(data),
            content_type: described.content_type,
            e_tag: described.e_tag,
        })
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to create file");
            StorageError::UploadFailed(e.to_string())
        })?;
        file.write_all(&data).await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to write file");
            StorageError::UploadFailed(e.to_string())
        })?;
        file.flush()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local write successful"
        );

        Ok(())
    }

    async fn put_if_match(
        &self,
        key: &str,
        _data: Bytes,
        _content_type: &str,
        _expected_e_tag: Option<&str>,
    ) -> StorageResult<()> {
        Err(StorageError::Unsupported(format!(
            "conditional put on local storage ({})",
            key
        )))
    }

    fn supports_conditional_put(&self) -> bool {
        false
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key = %key, "Local delete successful");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "Failed to delete file");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn delete_many(&self, keys: &[String]) -> StorageResult<DeleteReport> {
        let mut report = DeleteReport::default();
        for key in keys {
            match self.delete(key).await {
                Ok(()) => report.deleted.push(key.clone()),
                Err(e) => report.failed.push((key.clone(), e.to_string())),
            }
        }
        Ok(report)
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StorageResult<ListPage> {
        let files = self.walk().await?;

        let mut matching = files
            .into_iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation.map_or(true, |token| key.as_str() > token))
            .peekable();

        let mut objects = Vec::new();
        while objects.len() < self.page_size {
            match matching.next() {
                Some((key, path)) => objects.push(self.describe(key, &path).await?),
                None => break,
            }
        }

        let next_token = if matching.peek().is_some() {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }

    async fn presigned_url(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        // Local storage has no signing; the root is served publicly.
        self.key_to_path(key)?;
        Ok(self.generate_url(key))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
