//! HTTP error response conversion
//!
//! This module provides ErrorResponse type for HTTP error responses.
//! Note: IntoResponse implementation for AppError lives in the API crate
//! due to Rust's orphan rule: external traits (axum::IntoResponse) for external types
//! (pixdrop_core::AppError) cannot be implemented here.

use serde::Serialize;

/// Standard error response format for HTTP APIs
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Quota parameters (`limit`, `timeWindow`) merged into the top-level object.
    #[serde(flatten)]
    pub limits: Option<serde_json::Value>,
}
