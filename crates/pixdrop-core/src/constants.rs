//! Well-known keys and defaults shared across crates.

/// Key of the quota ledger document.
pub const LEDGER_KEY: &str = "stats/monthly-usage.json";

pub const UPLOADS_PREFIX: &str = "uploads/";
pub const PROCESSED_PREFIX: &str = "processed/";
pub const THUMBNAILS_PREFIX: &str = "thumbnails/";

/// Largest batch accepted by the S3 DeleteObjects call.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Page size used for listing when none is configured (S3 ListObjectsV2 maximum).
pub const DEFAULT_LIST_PAGE_SIZE: usize = 1000;

pub const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u64 = 3600;

pub const BYTES_PER_MB: u64 = 1024 * 1024;
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
