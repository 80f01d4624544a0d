//! Fault-injecting storage wrapper for tests.

use crate::traits::{DeleteReport, ListPage, Storage, StorageError, StorageResult, StoredBlob};
use crate::{MemoryStorage, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Wraps a [`MemoryStorage`], recording bulk-delete calls and failing on demand.
pub struct FaultyStorage {
    inner: MemoryStorage,
    delete_batches: Mutex<Vec<usize>>,
    failing_delete_calls: Mutex<HashSet<usize>>,
    fail_reads: AtomicBool,
    fail_lists: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
}

impl FaultyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            delete_batches: Mutex::new(Vec::new()),
            failing_delete_calls: Mutex::new(HashSet::new()),
            fail_reads: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            read_delay: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    /// Make the `call`-th (0-based) `delete_many` invocation fail outright.
    pub fn fail_delete_call(&self, call: usize) {
        self.failing_delete_calls.lock().unwrap().insert(call);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Delay every `get`, widening read-modify-write races.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Sizes of every `delete_many` call, in order.
    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn get(&self, key: &str) -> StorageResult<StoredBlob> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("injected read failure".to_string()));
        }
        let delay = *self.read_delay.lock().unwrap();
        let blob = self.inner.get(key).await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        blob
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.inner.put(key, data, content_type).await
    }

    async fn put_if_match(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        expected_e_tag: Option<&str>,
    ) -> StorageResult<()> {
        self.inner
            .put_if_match(key, data, content_type, expected_e_tag)
            .await
    }

    fn supports_conditional_put(&self) -> bool {
        self.inner.supports_conditional_put()
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> StorageResult<DeleteReport> {
        let call = {
            let mut batches = self.delete_batches.lock().unwrap();
            batches.push(keys.len());
            batches.len() - 1
        };
        if self.failing_delete_calls.lock().unwrap().contains(&call) {
            return Err(StorageError::DeleteFailed(format!(
                "injected failure on delete call {}",
                call
            )));
        }
        self.inner.delete_many(keys).await
    }

    async fn list_page(&self, prefix: &str, continuation: Option<&str>) -> StorageResult<ListPage> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StorageError::ListFailed("injected list failure".to_string()));
        }
        self.inner.list_page(prefix, continuation).await
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.inner.presigned_url(key, expires_in).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
