//! Per-client upload quota.
//!
//! Callers only see `check_and_charge`; whether the implementation is a plain
//! read-modify-write or an etag-conditioned one is hidden behind this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;

#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Returns whether `client_id` may upload at `now`, charging one upload when it may.
    ///
    /// `Ok(false)` is a rate-limit rejection and performs no write.
    async fn check_and_charge(&self, client_id: &str, now: DateTime<Utc>)
        -> Result<bool, AppError>;

    /// Uploads allowed per window, reported to clients on rejection.
    fn limit(&self) -> u32;

    /// Window length in hours, reported to clients on rejection.
    fn window_hours(&self) -> u32;
}
