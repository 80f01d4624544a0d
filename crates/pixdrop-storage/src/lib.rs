//! Pixdrop Storage Library
//!
//! This crate provides the object store abstraction and its implementations: S3 (and
//! S3-compatible endpoints) through `object_store`, the local filesystem, and an in-memory
//! store for tests and development.
//!
//! # Storage key format
//!
//! Keys are flat. The first segment is the object's role:
//!
//! - `uploads/{uuid}-{file name}`: admitted originals
//! - `processed/{file name}`: transform output
//! - `thumbnails/{file name}`: 200px previews of processed images
//! - `stats/monthly-usage.json`: the quota ledger document
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all callers stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Test helpers (tests in this crate, or dependents enabling `test-utils`)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use pixdrop_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    list_all, DeleteReport, ListPage, Storage, StorageError, StorageResult, StoredBlob,
};
