//! Pixdrop Services Layer
//!
//! This crate is the **business service layer**: the ingestion gate that orders the upload
//! checks, the lifecycle sweeper that expires old objects, and the media service that
//! persists uploads and runs transforms. It re-exports the infrastructure, processing and
//! storage pieces the API and CLI need so they depend on a single facade. Keep thin HTTP
//! handling in pixdrop-api.

#[cfg(feature = "cleanup")]
pub mod cleanup;
pub mod ingestion;
#[cfg(feature = "image")]
pub mod media;

#[cfg(feature = "cleanup")]
pub use cleanup::{LifecycleSweeper, SweepReport};
pub use ingestion::IngestionGate;
#[cfg(feature = "image")]
pub use media::{
    FetchedImage, ImageSummary, MediaService, ProcessRequest, ProcessedImage, UploadRequest,
    UploadedImage,
};

#[cfg(feature = "rate-limit")]
pub use pixdrop_infra::ObjectStoreQuotaLedger;
#[cfg(feature = "capacity")]
pub use pixdrop_infra::{StorageCapacityGate, StorageUsage};
pub use pixdrop_processing::MediaValidator;
#[cfg(feature = "image")]
pub use pixdrop_processing::TransformOperation;
pub use pixdrop_storage::{
    create_storage, MemoryStorage, Storage, StorageBackend, StorageError, StorageResult,
};
