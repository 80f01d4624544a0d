//! Explicit policies handed to each gate at construction time.
//!
//! Whether a limit is enforced is part of the policy value; gates never consult the
//! deployment stage or the environment themselves.

use std::time::Duration;

use crate::constants::{
    BYTES_PER_MB, MAX_DELETE_BATCH, PROCESSED_PREFIX, THUMBNAILS_PREFIX, UPLOADS_PREFIX,
};

/// Per-client upload rate limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// When false every check admits without touching the store.
    pub enforced: bool,
    pub max_uploads_per_window: u32,
    pub window_hours: u32,
    /// Use etag-conditioned ledger writes when the backend supports them.
    pub conditional_writes: bool,
    /// Attempts made when a conditional write loses a race.
    pub max_conflict_attempts: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            enforced: true,
            max_uploads_per_window: 5,
            window_hours: 6,
            conditional_writes: false,
            max_conflict_attempts: 3,
        }
    }
}

/// Aggregate bucket size ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityPolicy {
    pub enforced: bool,
    pub ceiling_gb: f64,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            enforced: true,
            ceiling_gb: 4.5,
        }
    }
}

/// Size and type rules evaluated before any store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionPolicy {
    pub max_file_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl IngestionPolicy {
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let normalized = content_type.trim().to_lowercase();
        self.allowed_content_types.iter().any(|t| *t == normalized)
    }

    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_bytes / BYTES_PER_MB
    }
}

impl Default for IngestionPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 20 * BYTES_PER_MB,
            allowed_content_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

/// Expiry sweep settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPolicy {
    pub retention_hours: u32,
    /// Namespaces whose objects expire.
    pub prefixes: Vec<String>,
    /// Keys per bulk-delete call, never above `MAX_DELETE_BATCH`.
    pub batch_size: usize,
    /// Time between scheduled sweeps; zero disables the schedule.
    pub interval: Duration,
}

impl SweepPolicy {
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_DELETE_BATCH)
    }
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            retention_hours: 6,
            prefixes: vec![
                UPLOADS_PREFIX.to_string(),
                PROCESSED_PREFIX.to_string(),
                THUMBNAILS_PREFIX.to_string(),
            ],
            batch_size: MAX_DELETE_BATCH,
            interval: Duration::from_secs(3600),
        }
    }
}
