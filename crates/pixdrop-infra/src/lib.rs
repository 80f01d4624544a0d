//! Pixdrop Infrastructure Library
//!
//! This crate provides the object-store-backed implementations of the pipeline's shared
//! state and the components used across binaries:
//! - Quota ledger (per-client upload counters in a single JSON document)
//! - Storage capacity gate (aggregate bucket size against a ceiling)
//! - Middleware (request ID)
//! - Telemetry initialization
//! - Error response body

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "capacity")]
pub mod capacity;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId};

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;

pub use error::ErrorResponse;

#[cfg(feature = "rate-limit")]
pub use rate_limit::ObjectStoreQuotaLedger;

#[cfg(feature = "capacity")]
pub use capacity::{StorageCapacityGate, StorageUsage};
