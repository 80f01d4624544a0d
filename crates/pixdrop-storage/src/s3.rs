use crate::traits::{DeleteReport, ListPage, Storage, StorageError, StorageResult, StoredBlob};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder, S3ConditionalPut};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectMeta, ObjectStore, ObjectStoreExt, PutMode, PutOptions,
    PutPayload, Result as ObjectResult, UpdateVersion,
};
use percent_encoding::percent_decode_str;
use pixdrop_core::StoredObject;
use std::collections::HashMap;
use std::time::Duration;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    page_size: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `page_size` - Objects per listing page (S3 caps this at 1000)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        page_size: usize,
    ) -> StorageResult<Self> {
        // Credentials come from the environment; bucket and region are explicit.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone())
            .with_conditional_put(S3ConditionalPut::ETagMatch);

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            page_size: page_size.max(1),
        })
    }

    fn put_options(content_type: &str, mode: PutMode) -> PutOptions {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        PutOptions {
            mode,
            attributes,
            ..Default::default()
        }
    }

}

/// Path for a caller-supplied key. Characters S3 would mangle are percent-encoded.
fn object_path(key: &str) -> Path {
    Path::from(key)
}

/// Inverse of [`object_path`]: the key as callers wrote it.
fn logical_key(location: &Path) -> String {
    location
        .as_ref()
        .split(object_store::path::DELIMITER)
        .map(|part| percent_decode_str(part).decode_utf8_lossy())
        .collect::<Vec<_>>()
        .join(object_store::path::DELIMITER)
}

fn to_stored_object(meta: ObjectMeta) -> StoredObject {
    StoredObject {
        key: logical_key(&meta.location),
        size: meta.size,
        content_type: None,
        last_modified: meta.last_modified,
        e_tag: meta.e_tag,
    }
}

/// One listing page under `prefix`, resuming after the logical key in `continuation`.
async fn list_keys<S: ObjectStore>(
    store: &S,
    prefix: &str,
    continuation: Option<&str>,
    page_size: usize,
) -> ObjectResult<ListPage> {
    let prefix_path = object_path(prefix);
    let stream = match continuation {
        Some(token) => store.list_with_offset(Some(&prefix_path), &object_path(token)),
        None => store.list(Some(&prefix_path)),
    };

    // One extra entry tells us whether another page exists.
    let mut metas: Vec<ObjectMeta> = stream.take(page_size + 1).try_collect().await?;
    let has_more = metas.len() > page_size;
    metas.truncate(page_size);

    let objects: Vec<StoredObject> = metas
        .into_iter()
        .map(to_stored_object)
        .filter(|o| o.key.starts_with(prefix))
        .collect();
    let next_token = if has_more {
        objects.last().map(|o| o.key.clone())
    } else {
        None
    };

    Ok(ListPage {
        objects,
        next_token,
    })
}

/// Bulk delete by logical key. Missing objects count as deleted.
async fn delete_keys<S: ObjectStore>(store: &S, keys: &[String]) -> DeleteReport {
    // Results come back as encoded paths; map them to the keys callers passed in.
    let by_location: HashMap<String, &String> = keys
        .iter()
        .map(|k| (object_path(k).to_string(), k))
        .collect();
    let locations: Vec<ObjectResult<Path>> = keys.iter().map(|k| Ok(object_path(k))).collect();

    // object_store groups these into DeleteObjects requests of up to 1000 keys.
    let results: Vec<ObjectResult<Path>> = store
        .delete_stream(futures::stream::iter(locations).boxed())
        .collect()
        .await;

    let mut acknowledged: Vec<String> = Vec::new();
    let mut last_error: Option<String> = None;
    for result in results {
        match result {
            Ok(path) => acknowledged.push(path.to_string()),
            Err(ObjectStoreError::NotFound { path, .. }) => acknowledged.push(path),
            Err(e) => last_error = Some(e.to_string()),
        }
    }
    let deleted: Vec<&String> = acknowledged
        .iter()
        .filter_map(|location| by_location.get(location).copied())
        .collect();

    let mut report = DeleteReport::default();
    for key in keys {
        if deleted.contains(&key) {
            report.deleted.push(key.clone());
        } else {
            let reason = last_error
                .clone()
                .unwrap_or_else(|| "not acknowledged by store".to_string());
            report.failed.push((key.clone(), reason));
        }
    }
    report
}

#[async_trait]
impl Storage for S3Storage {
    async fn get(&self, key: &str) -> StorageResult<StoredBlob> {
        let start = std::time::Instant::now();
        let location = object_path(key);

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 get failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let e_tag = result.meta.e_tag.clone();
        let content_type = result.attributes.get(&Attribute::ContentType).map(|v| {
            let value: &str = v.as_ref();
            value.to_string()
        });

        let data = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = data.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 get successful"
        );

        Ok(StoredBlob {
            data,
            content_type,
            e_tag,
        })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        let size = data.len() as u64;
        let location = object_path(key);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put_opts(
                &location,
                PutPayload::from(data),
                Self::put_options(content_type, PutMode::Overwrite),
            )
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 put failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 put successful"
        );

        Ok(())
    }

    async fn put_if_match(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        expected_e_tag: Option<&str>,
    ) -> StorageResult<()> {
        let location = object_path(key);
        let start = std::time::Instant::now();
        let mode = match expected_e_tag {
            Some(e_tag) => PutMode::Update(UpdateVersion {
                e_tag: Some(e_tag.to_string()),
                version: None,
            }),
            None => PutMode::Create,
        };

        let result: ObjectResult<_> = self
            .store
            .put_opts(
                &location,
                PutPayload::from(data),
                Self::put_options(content_type, mode),
            )
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 conditional put successful"
                );
                Ok(())
            }
            Err(ObjectStoreError::Precondition { .. })
            | Err(ObjectStoreError::AlreadyExists { .. }) => {
                tracing::debug!(bucket = %self.bucket, key = %key, "S3 conditional put lost race");
                Err(StorageError::PreconditionFailed(key.to_string()))
            }
            Err(ObjectStoreError::NotImplemented { .. }) => Err(StorageError::Unsupported(
                "conditional put on this S3 endpoint".to_string(),
            )),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 conditional put failed"
                );
                Err(StorageError::UploadFailed(e.to_string()))
            }
        }
    }

    fn supports_conditional_put(&self) -> bool {
        true
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = object_path(key);

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn delete_many(&self, keys: &[String]) -> StorageResult<DeleteReport> {
        let start = std::time::Instant::now();
        let report = delete_keys(&self.store, keys).await;

        tracing::info!(
            bucket = %self.bucket,
            requested = keys.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bulk delete finished"
        );

        Ok(report)
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StorageResult<ListPage> {
        let start = std::time::Instant::now();

        let page = list_keys(&self.store, prefix, continuation, self.page_size)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    prefix = %prefix,
                    "S3 list failed"
                );
                StorageError::ListFailed(e.to_string())
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            count = page.objects.len(),
            has_more = page.next_token.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list page"
        );

        Ok(page)
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = object_path(key);
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(url)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = object_path(key);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[test]
    fn logical_key_reverses_encoding() {
        for key in [
            "uploads/uuid-50%off.png",
            "uploads/photo#1.png",
            "processed/a b[1]{x}.jpg",
            "thumbnails/plain.webp",
        ] {
            assert_eq!(logical_key(&object_path(key)), key);
        }
        assert_eq!(
            object_path("uploads/uuid-50%off.png").to_string(),
            "uploads/uuid-50%25off.png"
        );
    }

    async fn seed(store: &InMemory, keys: &[&str]) {
        for key in keys {
            store
                .put(&object_path(key), PutPayload::from(Bytes::from_static(b"x")))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn listed_keys_with_reserved_characters_can_be_deleted() {
        let store = InMemory::new();
        seed(&store, &["uploads/uuid-50%off.png", "uploads/photo#1.png"]).await;

        let page = list_keys(&store, "uploads/", None, 10).await.unwrap();
        let mut keys: Vec<String> = page.objects.into_iter().map(|o| o.key).collect();
        keys.sort();
        assert_eq!(keys, vec!["uploads/photo#1.png", "uploads/uuid-50%off.png"]);

        let report = delete_keys(&store, &keys).await;
        assert_eq!(report.deleted.len(), 2);
        assert!(report.failed.is_empty());

        let remaining = list_keys(&store, "uploads/", None, 10).await.unwrap();
        assert!(remaining.objects.is_empty());
    }

    #[tokio::test]
    async fn continuation_token_resumes_after_encoded_key() {
        let store = InMemory::new();
        seed(&store, &["uploads/a%1.png", "uploads/b#2.png", "uploads/c.png"]).await;

        let first = list_keys(&store, "uploads/", None, 2).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        let token = first.next_token.clone().unwrap();

        let second = list_keys(&store, "uploads/", Some(&token), 2)
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "uploads/c.png");
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn missing_keys_count_as_deleted() {
        let store = InMemory::new();
        let report = delete_keys(&store, &["uploads/gone%20.png".to_string()]).await;
        assert_eq!(report.deleted, vec!["uploads/gone%20.png".to_string()]);
    }
}
