use std::sync::Arc;

use async_trait::async_trait;

use pixdrop_core::constants::BYTES_PER_GB;
use pixdrop_core::{AppError, CapacityGate, CapacityPolicy};
use pixdrop_storage::Storage;

/// Aggregate size of everything in the bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageUsage {
    pub object_count: u64,
    pub total_bytes: u64,
}

impl StorageUsage {
    pub fn total_gb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_GB
    }
}

/// Capacity gate that recomputes bucket usage from a full listing on every check.
///
/// Cost is O(object count) per upload. That is fine at the scale this service targets;
/// a larger deployment would need a maintained running total instead.
pub struct StorageCapacityGate {
    storage: Arc<dyn Storage>,
    policy: CapacityPolicy,
}

impl StorageCapacityGate {
    pub fn new(storage: Arc<dyn Storage>, policy: CapacityPolicy) -> Self {
        Self { storage, policy }
    }

    /// Sum object sizes across every namespace, following continuation tokens until the
    /// store reports no further pages.
    #[tracing::instrument(skip(self))]
    pub async fn measure(&self) -> Result<StorageUsage, AppError> {
        let start = std::time::Instant::now();
        let mut usage = StorageUsage {
            object_count: 0,
            total_bytes: 0,
        };
        let mut token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self
                .storage
                .list_page("", token.as_deref())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, pages, "Failed to list objects for capacity check");
                    AppError::StoreUnavailable(e.to_string())
                })?;
            pages += 1;

            for object in &page.objects {
                usage.object_count += 1;
                usage.total_bytes += object.size;
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            pages,
            object_count = usage.object_count,
            total_bytes = usage.total_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Measured storage usage"
        );

        Ok(usage)
    }
}

#[async_trait]
impl CapacityGate for StorageCapacityGate {
    async fn within_capacity(&self) -> Result<bool, AppError> {
        if !self.policy.enforced {
            return Ok(true);
        }

        let usage = self.measure().await?;
        let within = usage.total_gb() < self.policy.ceiling_gb;
        if !within {
            tracing::warn!(
                total_gb = usage.total_gb(),
                ceiling_gb = self.policy.ceiling_gb,
                "Storage capacity reached"
            );
        }
        Ok(within)
    }

    fn ceiling_gb(&self) -> f64 {
        self.policy.ceiling_gb
    }
}
