use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;

use pixdrop_core::constants::LEDGER_KEY;
use pixdrop_core::models::{period_key, ChargeOutcome};
use pixdrop_core::{AppError, LedgerDocument, PeriodUsage, QuotaLedger, QuotaPolicy};
use pixdrop_storage::{Storage, StorageError};

const LEDGER_CONTENT_TYPE: &str = "application/json";

/// Quota ledger kept as a single JSON document in the object store.
///
/// Every charge is a read-modify-write of the whole document. Without conditional writes
/// two concurrent requests can read the same counter and both write back `count + 1`, so
/// the bound is only exact for serialized requests: with `k` requests racing, a client may
/// be admitted up to `k - 1` times beyond the limit. When the policy asks for conditional
/// writes and the backend supports them, the write is conditioned on the etag that was read
/// and a lost race is retried a bounded number of times.
pub struct ObjectStoreQuotaLedger {
    storage: Arc<dyn Storage>,
    policy: QuotaPolicy,
}

impl ObjectStoreQuotaLedger {
    pub fn new(storage: Arc<dyn Storage>, policy: QuotaPolicy) -> Self {
        if policy.conditional_writes && !storage.supports_conditional_put() {
            tracing::warn!(
                backend = %storage.backend_type(),
                "Conditional ledger writes requested but unsupported by backend; \
                 falling back to last-writer-wins"
            );
        }
        Self { storage, policy }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    fn uses_conditional_writes(&self) -> bool {
        self.policy.conditional_writes && self.storage.supports_conditional_put()
    }

    /// Read the ledger. A missing document is empty, never an error.
    async fn read_document(&self) -> Result<(LedgerDocument, Option<String>), AppError> {
        match self.storage.get(LEDGER_KEY).await {
            Ok(blob) => match LedgerDocument::from_slice(&blob.data) {
                Ok(document) => Ok((document, blob.e_tag)),
                Err(e) => {
                    // An unreadable document would otherwise block every upload; the next
                    // successful charge replaces it.
                    tracing::warn!(
                        error = %e,
                        key = LEDGER_KEY,
                        "Quota ledger is not valid JSON; treating as empty"
                    );
                    Ok((LedgerDocument::default(), blob.e_tag))
                }
            },
            Err(StorageError::NotFound(_)) => Ok((LedgerDocument::default(), None)),
            Err(e) => {
                tracing::error!(error = %e, key = LEDGER_KEY, "Failed to read quota ledger");
                Err(AppError::StoreUnavailable(e.to_string()))
            }
        }
    }

    fn encode(document: &LedgerDocument) -> Result<Bytes, AppError> {
        document
            .to_vec()
            .map(Bytes::from)
            .map_err(|e| AppError::Internal(format!("Failed to encode quota ledger: {}", e)))
    }

    async fn charge_last_writer_wins(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let (mut document, _) = self.read_document().await?;

        match document.charge(client_id, now, &self.policy) {
            ChargeOutcome::Limited { count } => {
                tracing::info!(client_id = %client_id, count, "Upload rate limit reached");
                Ok(false)
            }
            ChargeOutcome::Charged { count } => {
                self.storage
                    .put(LEDGER_KEY, Self::encode(&document)?, LEDGER_CONTENT_TYPE)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            error = %e,
                            key = LEDGER_KEY,
                            "Failed to write quota ledger"
                        );
                        AppError::StoreUnavailable(e.to_string())
                    })?;
                tracing::debug!(client_id = %client_id, count, "Upload charged");
                Ok(true)
            }
        }
    }

    async fn charge_conditional(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let attempts = self.policy.max_conflict_attempts.max(1);

        for attempt in 0..attempts {
            let (mut document, e_tag) = self.read_document().await?;

            let count = match document.charge(client_id, now, &self.policy) {
                ChargeOutcome::Limited { count } => {
                    tracing::info!(client_id = %client_id, count, "Upload rate limit reached");
                    return Ok(false);
                }
                ChargeOutcome::Charged { count } => count,
            };

            match self
                .storage
                .put_if_match(
                    LEDGER_KEY,
                    Self::encode(&document)?,
                    LEDGER_CONTENT_TYPE,
                    e_tag.as_deref(),
                )
                .await
            {
                Ok(()) => {
                    tracing::debug!(client_id = %client_id, count, attempt, "Upload charged");
                    return Ok(true);
                }
                Err(StorageError::PreconditionFailed(_)) => {
                    let jitter: u64 = rand::rng().random_range(0..50);
                    let delay_ms = 50 * (u64::from(attempt) + 1) + jitter;
                    tracing::warn!(
                        client_id = %client_id,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms,
                        "Quota ledger changed concurrently, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, key = LEDGER_KEY, "Failed to write quota ledger");
                    return Err(AppError::StoreUnavailable(e.to_string()));
                }
            }
        }

        Err(AppError::Conflict(format!(
            "Quota ledger update lost {} consecutive races",
            attempts
        )))
    }

    /// Delete the whole ledger. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self) -> Result<(), AppError> {
        self.storage.delete(LEDGER_KEY).await.map_err(|e| {
            tracing::error!(error = %e, key = LEDGER_KEY, "Failed to reset quota ledger");
            AppError::StoreUnavailable(e.to_string())
        })?;
        tracing::info!(key = LEDGER_KEY, "Quota ledger reset");
        Ok(())
    }

    /// Per-client counters of the period containing `now`.
    pub async fn period_usage(&self, now: DateTime<Utc>) -> Result<PeriodUsage, AppError> {
        let (document, _) = self.read_document().await?;
        Ok(document
            .periods
            .get(&period_key(now))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl QuotaLedger for ObjectStoreQuotaLedger {
    #[tracing::instrument(skip(self), fields(enforced = self.policy.enforced))]
    async fn check_and_charge(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        if !self.policy.enforced {
            return Ok(true);
        }

        if self.uses_conditional_writes() {
            self.charge_conditional(client_id, now).await
        } else {
            self.charge_last_writer_wins(client_id, now).await
        }
    }

    fn limit(&self) -> u32 {
        self.policy.max_uploads_per_window
    }

    fn window_hours(&self) -> u32 {
        self.policy.window_hours
    }
}
