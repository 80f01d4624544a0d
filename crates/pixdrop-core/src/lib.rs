//! Pixdrop Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and gate traits
//! shared by every pixdrop component. It performs no I/O besides reading configuration.

pub mod capacity_gate;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod quota_ledger;
pub mod storage_types;

// Re-export commonly used types
pub use capacity_gate::CapacityGate;
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    CapacityPolicy, ClientUsage, IngestionDecision, IngestionPolicy, LedgerDocument,
    ObjectRole, PeriodUsage, QuotaPolicy, StoredObject, SweepPolicy,
};
pub use quota_ledger::QuotaLedger;
pub use storage_types::StorageBackend;
