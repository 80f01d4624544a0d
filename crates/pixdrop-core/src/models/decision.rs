use serde::Serialize;

use crate::error::AppError;

/// Outcome of the ingestion checks for one upload. Computed per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum IngestionDecision {
    Admit,
    RejectSize { size: u64, max: u64 },
    RejectType { content_type: String, allowed: Vec<String> },
    RejectRate { limit: u32, window_hours: u32 },
    RejectCapacity { limit_gb: f64 },
}

impl IngestionDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, IngestionDecision::Admit)
    }

    /// Status code the HTTP layer relays for this decision.
    pub fn http_status_code(&self) -> u16 {
        match self {
            IngestionDecision::Admit => 200,
            IngestionDecision::RejectSize { .. } | IngestionDecision::RejectType { .. } => 400,
            IngestionDecision::RejectRate { .. } => 429,
            IngestionDecision::RejectCapacity { .. } => 507,
        }
    }

    /// `Ok(())` for `Admit`, otherwise the matching error with its thresholds.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            IngestionDecision::Admit => Ok(()),
            IngestionDecision::RejectSize { size, max } => {
                Err(AppError::PayloadTooLarge { size, max })
            }
            IngestionDecision::RejectType {
                content_type,
                allowed,
            } => Err(AppError::UnsupportedType {
                content_type,
                allowed,
            }),
            IngestionDecision::RejectRate {
                limit,
                window_hours,
            } => Err(AppError::RateLimited {
                limit,
                window_hours,
            }),
            IngestionDecision::RejectCapacity { limit_gb } => {
                Err(AppError::CapacityExceeded { limit_gb })
            }
        }
    }
}
