//! Error types module
//!
//! Every failure a public pixdrop operation can report is one `AppError` variant. Store
//! faults from any backend are folded into `StoreUnavailable` or `NotFound` at the gate
//! boundary, so callers match a closed set of kinds.

use serde_json::json;

use crate::constants::BYTES_PER_MB;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for quota rejections and partial failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "RATE_LIMITED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Unsupported content type: {content_type} (allowed: {allowed:?})")]
    UnsupportedType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Rate limit reached: {limit} uploads per {window_hours} hours")]
    RateLimited { limit: u32, window_hours: u32 },

    #[error("Storage limit reached: {limit_gb} GB")]
    CapacityExceeded { limit_gb: f64 },

    #[error("Concurrent ledger update: {0}")]
    Conflict(String),

    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sweep partially failed: {failed_batches} batches ({failed_keys} keys) not deleted")]
    PartialSweepFailure {
        failed_batches: usize,
        failed_keys: usize,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Static metadata for each variant:
/// (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge { .. } => (
            400,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedType { .. } => (
            400,
            "UNSUPPORTED_TYPE",
            false,
            Some("Upload a JPEG, PNG, GIF or WebP image"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnknownOperation(_) => (
            400,
            "UNKNOWN_OPERATION",
            false,
            Some("Use one of the supported processing options"),
            false,
            LogLevel::Debug,
        ),
        AppError::ImageProcessing(_) => (
            400,
            "IMAGE_PROCESSING_ERROR",
            false,
            Some("Check image format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::RateLimited { .. } => (
            429,
            "RATE_LIMITED",
            true,
            Some("Wait for the upload window to reset"),
            false,
            LogLevel::Warn,
        ),
        AppError::CapacityExceeded { .. } => (
            507,
            "STORAGE_LIMIT_REACHED",
            true,
            Some("Retry after expired images are cleaned up"),
            false,
            LogLevel::Warn,
        ),
        AppError::Conflict(_) => (
            409,
            "LEDGER_CONFLICT",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::StoreUnavailable(_) => (
            503,
            "STORE_UNAVAILABLE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file name exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PartialSweepFailure { .. } => (
            500,
            "PARTIAL_SWEEP_FAILURE",
            true,
            Some("Remaining objects are retried on the next sweep"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidInput(_) => "ValidationError",
            AppError::PayloadTooLarge { .. } => "ValidationError",
            AppError::UnsupportedType { .. } => "ValidationError",
            AppError::UnknownOperation(_) => "ValidationError",
            AppError::ImageProcessing(_) => "ImageProcessing",
            AppError::RateLimited { .. } => "QuotaExceeded",
            AppError::CapacityExceeded { .. } => "QuotaExceeded",
            AppError::Conflict(_) => "Conflict",
            AppError::StoreUnavailable(_) => "StoreUnavailable",
            AppError::NotFound(_) => "NotFound",
            AppError::PartialSweepFailure { .. } => "PartialSweepFailure",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Threshold values a client needs to explain a quota or size rejection.
    pub fn limit_details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::PayloadTooLarge { max, .. } => Some(json!({ "limit": max / BYTES_PER_MB })),
            AppError::RateLimited {
                limit,
                window_hours,
            } => Some(json!({ "limit": limit, "timeWindow": window_hours })),
            AppError::CapacityExceeded { limit_gb } => Some(json!({ "limit": limit_gb })),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::PayloadTooLarge { max, .. } => {
                format!("File size exceeds {}MB limit", max / BYTES_PER_MB)
            }
            AppError::UnsupportedType { content_type, .. } => {
                format!("Content type '{}' is not allowed", content_type)
            }
            AppError::UnknownOperation(_) => "Invalid processing option".to_string(),
            AppError::ImageProcessing(ref msg) => msg.clone(),
            AppError::RateLimited {
                limit,
                window_hours,
            } => format!(
                "Rate limit reached. Maximum {} uploads allowed every {} hours.",
                limit, window_hours
            ),
            AppError::CapacityExceeded { .. } => {
                "Storage limit reached. Please try again later.".to_string()
            }
            AppError::Conflict(_) => "Upload counter is busy, please retry".to_string(),
            AppError::StoreUnavailable(_) => "Storage is temporarily unavailable".to_string(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PartialSweepFailure {
                failed_batches,
                failed_keys,
            } => format!(
                "{} expired objects in {} batches could not be deleted",
                failed_keys, failed_batches
            ),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
