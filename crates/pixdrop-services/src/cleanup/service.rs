use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::time::interval;

use pixdrop_core::{AppError, StoredObject, SweepPolicy};
use pixdrop_storage::{list_all, Storage};

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Objects listed across all swept prefixes.
    pub scanned: usize,
    /// Objects strictly older than the cutoff.
    pub expired: usize,
    pub deleted: usize,
    /// Bulk-delete calls issued.
    pub batches: usize,
    pub failed_batches: usize,
    pub failed_keys: usize,
    pub duration_ms: u64,
}

impl SweepReport {
    /// The pass left expired objects behind; they are retried on the next pass.
    pub fn partial_failure(&self) -> Option<AppError> {
        (self.failed_batches > 0).then_some(AppError::PartialSweepFailure {
            failed_batches: self.failed_batches,
            failed_keys: self.failed_keys,
        })
    }
}

/// Deletes objects older than the retention window.
///
/// Each pass first snapshots every configured prefix, then deletes in bulk batches. Objects
/// written after the snapshot are never considered by that pass, so the sweeper can run
/// alongside uploads. A failed batch is logged and skipped; the next pass picks its keys up
/// again because they are still listed.
#[derive(Clone)]
pub struct LifecycleSweeper {
    storage: Arc<dyn Storage>,
    policy: SweepPolicy,
}

impl LifecycleSweeper {
    pub fn new(storage: Arc<dyn Storage>, policy: SweepPolicy) -> Self {
        Self { storage, policy }
    }

    pub fn policy(&self) -> &SweepPolicy {
        &self.policy
    }

    /// Start the background sweep loop on the policy interval.
    ///
    /// Returns `None` when the interval is zero (scheduling left to an external timer).
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self.policy.interval.is_zero() {
            tracing::info!("Scheduled sweep disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut sweep_interval = interval(self.policy.interval);

            loop {
                sweep_interval.tick().await;

                tracing::info!("Starting scheduled sweep of expired objects");

                match self.sweep(Utc::now()).await {
                    Ok(report) => {
                        if let Some(err) = report.partial_failure() {
                            tracing::warn!(error = %err, "Sweep finished with failed batches");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Sweep task failed"),
                }
            }
        }))
    }

    /// Sweep with the configured retention.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        self.sweep_with_retention(self.policy.retention_hours, now)
            .await
    }

    /// Delete every object in the swept prefixes whose `last_modified` is strictly before
    /// `now - retention_hours`. An object exactly at the cutoff is kept.
    ///
    /// Listing failures abort the pass before anything is deleted.
    #[tracing::instrument(skip(self), fields(sweep.prefixes = ?self.policy.prefixes))]
    pub async fn sweep_with_retention(
        &self,
        retention_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, AppError> {
        let start = Instant::now();
        let cutoff = now - Duration::hours(i64::from(retention_hours));

        let mut snapshot: Vec<StoredObject> = Vec::new();
        for prefix in &self.policy.prefixes {
            let objects = list_all(self.storage.as_ref(), prefix).await.map_err(|e| {
                tracing::error!(error = %e, prefix = %prefix, "Failed to list objects for sweep");
                AppError::StoreUnavailable(e.to_string())
            })?;
            snapshot.extend(objects);
        }

        let mut report = SweepReport {
            scanned: snapshot.len(),
            ..Default::default()
        };

        let expired: Vec<String> = snapshot
            .into_iter()
            .filter(|object| object.last_modified < cutoff)
            .map(|object| object.key)
            .collect();
        report.expired = expired.len();

        for batch in expired.chunks(self.policy.effective_batch_size()) {
            report.batches += 1;

            match self.storage.delete_many(batch).await {
                Ok(result) => {
                    report.deleted += result.deleted.len();
                    if !result.failed.is_empty() {
                        report.failed_batches += 1;
                        report.failed_keys += result.failed.len();
                        for (key, reason) in result.failed.iter().take(10) {
                            tracing::warn!(
                                key = %key,
                                reason = %reason,
                                "Failed to delete expired object"
                            );
                        }
                    }
                }
                Err(e) => {
                    report.failed_batches += 1;
                    report.failed_keys += batch.len();
                    tracing::error!(
                        error = %e,
                        batch = report.batches,
                        batch_size = batch.len(),
                        "Bulk delete failed, continuing with remaining batches"
                    );
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            retention_hours,
            cutoff = %cutoff,
            scanned = report.scanned,
            expired = report.expired,
            deleted = report.deleted,
            batches = report.batches,
            failed_batches = report.failed_batches,
            duration_ms = report.duration_ms,
            "Sweep completed"
        );

        Ok(report)
    }
}
