//! In-memory storage backend used by tests and the `memory` development backend.

use crate::traits::{DeleteReport, ListPage, Storage, StorageError, StorageResult, StoredBlob};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use pixdrop_core::constants::DEFAULT_LIST_PAGE_SIZE;
use pixdrop_core::StoredObject;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
    e_tag: String,
}

/// Ordered in-memory object store.
///
/// Listing honours `page_size` and uses the last returned key as the continuation token,
/// matching the S3 backend. Every write bumps a store-wide version counter used as the etag.
#[derive(Clone)]
pub struct MemoryStorage {
    objects: Arc<Mutex<BTreeMap<String, MemoryObject>>>,
    version: Arc<AtomicU64>,
    page_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_LIST_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            version: Arc::new(AtomicU64::new(0)),
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, MemoryObject>>> {
        self.objects
            .lock()
            .map_err(|_| StorageError::BackendError("memory store lock poisoned".to_string()))
    }

    fn next_e_tag(&self) -> String {
        format!("\"{}\"", self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Insert an object with an explicit modification time.
    pub fn insert_object(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        content_type: &str,
        last_modified: DateTime<Utc>,
    ) -> StorageResult<()> {
        let e_tag = self.next_e_tag();
        self.lock()?.insert(
            key.to_string(),
            MemoryObject {
                data: data.into(),
                content_type: content_type.to_string(),
                last_modified,
                e_tag,
            },
        );
        Ok(())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<StoredBlob> {
        let objects = self.lock()?;
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(StoredBlob {
            data: object.data.clone(),
            content_type: Some(object.content_type.clone()),
            e_tag: Some(object.e_tag.clone()),
        })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.insert_object(key, data, content_type, Utc::now())
    }

    async fn put_if_match(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        expected_e_tag: Option<&str>,
    ) -> StorageResult<()> {
        let e_tag = self.next_e_tag();
        let mut objects = self.lock()?;
        let current = objects.get(key).map(|o| o.e_tag.as_str());
        if current != expected_e_tag {
            return Err(StorageError::PreconditionFailed(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            MemoryObject {
                data,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
                e_tag,
            },
        );
        Ok(())
    }

    fn supports_conditional_put(&self) -> bool {
        true
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> StorageResult<DeleteReport> {
        let mut objects = self.lock()?;
        for key in keys {
            objects.remove(key);
        }
        Ok(DeleteReport {
            deleted: keys.to_vec(),
            failed: Vec::new(),
        })
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StorageResult<ListPage> {
        let objects = self.lock()?;
        let lower = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let page: Vec<StoredObject> = objects
            .range::<String, _>((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(self.page_size)
            .map(|(key, object)| StoredObject {
                key: key.clone(),
                size: object.data.len() as u64,
                content_type: Some(object.content_type.clone()),
                last_modified: object.last_modified,
                e_tag: Some(object.e_tag.clone()),
            })
            .collect();

        let next_token = match page.last() {
            Some(last) if page.len() == self.page_size => {
                let more = objects
                    .range::<String, _>((Bound::Excluded(last.key.clone()), Bound::Unbounded))
                    .next()
                    .is_some_and(|(key, _)| key.starts_with(prefix));
                more.then(|| last.key.clone())
            }
            _ => None,
        };

        Ok(ListPage {
            objects: page,
            next_token,
        })
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if !self.lock()?.contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!(
            "memory://{}?expires_in={}",
            urlencoding::encode(key),
            expires_in.as_secs()
        ))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
