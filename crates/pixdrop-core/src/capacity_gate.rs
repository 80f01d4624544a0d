//! Capacity gate trait for the ingestion path.
//!
//! Implementations decide whether the bucket has room for another upload. Used by the
//! ingestion gate after the per-client quota has been charged.

use async_trait::async_trait;

use crate::error::AppError;

/// Gate that determines whether the store can accept another upload.
#[async_trait]
pub trait CapacityGate: Send + Sync {
    /// Returns true while aggregate stored bytes are below the configured ceiling.
    async fn within_capacity(&self) -> Result<bool, AppError>;

    /// Ceiling reported to clients on rejection.
    fn ceiling_gb(&self) -> f64;
}
