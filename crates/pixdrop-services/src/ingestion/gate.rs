use std::sync::Arc;

use chrono::{DateTime, Utc};
use pixdrop_core::{AppError, CapacityGate, IngestionDecision, IngestionPolicy, QuotaLedger};
use pixdrop_processing::{MediaValidator, ValidationError};

/// Decides whether one upload may be stored.
///
/// Checks run in a fixed order: size, content type, per-client rate, bucket capacity.
/// The first failing check decides. Size and type never touch the store, so malformed
/// requests cost no quota. A rate check that admits has already charged the client, so a
/// later capacity rejection still consumes one upload from the window.
pub struct IngestionGate {
    validator: MediaValidator,
    ledger: Arc<dyn QuotaLedger>,
    capacity: Arc<dyn CapacityGate>,
}

impl IngestionGate {
    pub fn new(
        policy: &IngestionPolicy,
        ledger: Arc<dyn QuotaLedger>,
        capacity: Arc<dyn CapacityGate>,
    ) -> Self {
        Self {
            validator: MediaValidator::from_policy(policy),
            ledger,
            capacity,
        }
    }

    /// Evaluate the checks for a payload of `size` bytes declared as `content_type`.
    ///
    /// Rejections are `Ok` decisions; `Err` is reserved for malformed input and store
    /// faults, which are never reported as quota rejections.
    #[tracing::instrument(skip(self), fields(decision = tracing::field::Empty))]
    pub async fn evaluate(
        &self,
        client_id: &str,
        size: u64,
        content_type: &str,
        now: DateTime<Utc>,
    ) -> Result<IngestionDecision, AppError> {
        let decision = self.decide(client_id, size, content_type, now).await?;
        let label = match &decision {
            IngestionDecision::Admit => "admit",
            IngestionDecision::RejectSize { .. } => "reject_size",
            IngestionDecision::RejectType { .. } => "reject_type",
            IngestionDecision::RejectRate { .. } => "reject_rate",
            IngestionDecision::RejectCapacity { .. } => "reject_capacity",
        };
        tracing::Span::current().record("decision", label);
        tracing::info!(
            client_id = %client_id,
            size_bytes = size,
            decision = label,
            "Ingestion decision"
        );
        Ok(decision)
    }

    async fn decide(
        &self,
        client_id: &str,
        size: u64,
        content_type: &str,
        now: DateTime<Utc>,
    ) -> Result<IngestionDecision, AppError> {
        match self.validator.validate_file_size(size) {
            Ok(()) => {}
            Err(ValidationError::FileTooLarge { size, max }) => {
                return Ok(IngestionDecision::RejectSize { size, max })
            }
            Err(other) => return Err(other.into()),
        }

        match self.validator.validate_content_type(content_type) {
            Ok(()) => {}
            Err(ValidationError::InvalidContentType {
                content_type,
                allowed,
            }) => {
                return Ok(IngestionDecision::RejectType {
                    content_type,
                    allowed,
                })
            }
            Err(other) => return Err(other.into()),
        }

        if !self.ledger.check_and_charge(client_id, now).await? {
            return Ok(IngestionDecision::RejectRate {
                limit: self.ledger.limit(),
                window_hours: self.ledger.window_hours(),
            });
        }

        if !self.capacity.within_capacity().await? {
            return Ok(IngestionDecision::RejectCapacity {
                limit_gb: self.capacity.ceiling_gb(),
            });
        }

        Ok(IngestionDecision::Admit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingLedger {
        admit: bool,
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl QuotaLedger for CountingLedger {
        async fn check_and_charge(&self, _: &str, _: DateTime<Utc>) -> Result<bool, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::StoreUnavailable("ledger down".to_string()));
            }
            Ok(self.admit)
        }

        fn limit(&self) -> u32 {
            5
        }

        fn window_hours(&self) -> u32 {
            6
        }
    }

    struct FixedCapacity {
        within: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CapacityGate for FixedCapacity {
        async fn within_capacity(&self) -> Result<bool, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.within)
        }

        fn ceiling_gb(&self) -> f64 {
            4.5
        }
    }

    fn gate(admit: bool, within: bool) -> (IngestionGate, Arc<CountingLedger>, Arc<FixedCapacity>) {
        let ledger = Arc::new(CountingLedger {
            admit,
            calls: AtomicU32::new(0),
            fail: false,
        });
        let capacity = Arc::new(FixedCapacity {
            within,
            calls: AtomicU32::new(0),
        });
        let gate =
            IngestionGate::new(&IngestionPolicy::default(), ledger.clone(), capacity.clone());
        (gate, ledger, capacity)
    }

    const MB: u64 = 1024 * 1024;

    #[tokio::test]
    async fn admits_when_every_check_passes() {
        let (gate, _, _) = gate(true, true);
        let decision = gate.evaluate("c", 5 * MB, "image/jpeg", Utc::now()).await.unwrap();
        assert_eq!(decision, IngestionDecision::Admit);
    }

    #[tokio::test]
    async fn oversize_rejected_without_touching_ledger() {
        let (gate, ledger, capacity) = gate(true, true);
        let decision = gate.evaluate("c", 21 * MB, "image/jpeg", Utc::now()).await.unwrap();
        assert!(matches!(decision, IngestionDecision::RejectSize { .. }));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(capacity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn size_is_checked_before_type() {
        let (gate, _, _) = gate(true, true);
        let decision = gate
            .evaluate("c", 21 * MB, "application/pdf", Utc::now())
            .await
            .unwrap();
        assert!(matches!(decision, IngestionDecision::RejectSize { .. }));
    }

    #[tokio::test]
    async fn wrong_type_rejected_without_touching_ledger() {
        let (gate, ledger, _) = gate(true, true);
        let decision = gate
            .evaluate("c", MB, "application/pdf", Utc::now())
            .await
            .unwrap();
        assert!(matches!(decision, IngestionDecision::RejectType { .. }));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rate_rejection_skips_capacity_check() {
        let (gate, _, capacity) = gate(false, true);
        let decision = gate.evaluate("c", MB, "image/png", Utc::now()).await.unwrap();
        assert_eq!(
            decision,
            IngestionDecision::RejectRate {
                limit: 5,
                window_hours: 6
            }
        );
        assert_eq!(capacity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn capacity_rejection_reports_ceiling() {
        let (gate, _, _) = gate(true, false);
        let decision = gate.evaluate("c", MB, "image/png", Utc::now()).await.unwrap();
        assert_eq!(decision, IngestionDecision::RejectCapacity { limit_gb: 4.5 });
    }

    #[tokio::test]
    async fn store_fault_is_an_error_not_a_rejection() {
        let ledger = Arc::new(CountingLedger {
            admit: true,
            calls: AtomicU32::new(0),
            fail: true,
        });
        let capacity = Arc::new(FixedCapacity {
            within: true,
            calls: AtomicU32::new(0),
        });
        let gate = IngestionGate::new(&IngestionPolicy::default(), ledger, capacity);
        let err = gate.evaluate("c", MB, "image/png", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_payload_is_invalid_input() {
        let (gate, _, _) = gate(true, true);
        let err = gate.evaluate("c", 0, "image/png", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
