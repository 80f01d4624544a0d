//! Operator commands run directly against the object store.
//!
//! `sweep` is meant for external schedulers when the API's in-process schedule is
//! disabled (`SWEEP_INTERVAL_SECS=0`).

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use pixdrop_core::Config;
use pixdrop_services::{LifecycleSweeper, ObjectStoreQuotaLedger, Storage, StorageCapacityGate};
use serde_json::{json, Value};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Delete expired uploads, processed images and thumbnails
    Sweep {
        /// Override the configured retention window
        #[arg(long)]
        retention_hours: Option<u32>,
    },
    /// Delete the quota ledger, resetting every client's upload count
    ResetLimits,
    /// Show bucket usage against the ceiling and this period's upload counters
    Usage,
}

/// Run `command` and return its JSON report.
pub async fn execute(
    command: Commands,
    config: &Config,
    storage: Arc<dyn Storage>,
    now: DateTime<Utc>,
) -> anyhow::Result<Value> {
    match command {
        Commands::Sweep { retention_hours } => {
            let policy = config.sweep_policy();
            let hours = retention_hours.unwrap_or(policy.retention_hours);
            let sweeper = LifecycleSweeper::new(storage, policy);
            let report = sweeper
                .sweep_with_retention(hours, now)
                .await
                .context("Sweep aborted")?;
            if let Some(err) = report.partial_failure() {
                tracing::warn!(error = %err, "Sweep left expired objects behind");
            }
            Ok(serde_json::to_value(report)?)
        }
        Commands::ResetLimits => {
            ObjectStoreQuotaLedger::new(storage, config.quota_policy())
                .reset()
                .await
                .context("Failed to reset limits")?;
            Ok(json!({ "message": "Rate limits reset successfully" }))
        }
        Commands::Usage => {
            let capacity = config.capacity_policy();
            let usage = StorageCapacityGate::new(storage.clone(), capacity.clone())
                .measure()
                .await
                .context("Failed to measure bucket usage")?;
            let period = ObjectStoreQuotaLedger::new(storage, config.quota_policy())
                .period_usage(now)
                .await
                .context("Failed to read quota ledger")?;
            Ok(json!({
                "objects": usage.object_count,
                "totalBytes": usage.total_bytes,
                "totalGb": usage.total_gb(),
                "ceilingGb": capacity.ceiling_gb,
                "withinCapacity": usage.total_gb() < capacity.ceiling_gb,
                "period": pixdrop_core::models::period_key(now),
                "clients": period.clients,
            }))
        }
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Duration;
    use pixdrop_core::QuotaLedger;
    use pixdrop_services::MemoryStorage;

    fn config() -> Config {
        Config::from_lookup(|name| match name {
            "STORAGE_BACKEND" => Some("memory".to_string()),
            "QUOTA_ENFORCED" => Some("true".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sweep_reports_deleted_objects() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        storage
            .insert_object(
                "uploads/old.png",
                Bytes::from_static(b"x"),
                "image/png",
                now - Duration::hours(7),
            )
            .unwrap();
        storage
            .insert_object("uploads/new.png", Bytes::from_static(b"x"), "image/png", now)
            .unwrap();

        let report = execute(
            Commands::Sweep {
                retention_hours: None,
            },
            &config(),
            Arc::new(storage.clone()),
            now,
        )
        .await
        .unwrap();

        assert_eq!(report["deleted"], 1);
        assert_eq!(storage.keys(), vec!["uploads/new.png"]);
    }

    #[tokio::test]
    async fn retention_override_is_applied() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        storage
            .insert_object(
                "processed/a.png",
                Bytes::from_static(b"x"),
                "image/png",
                now - Duration::hours(2),
            )
            .unwrap();

        let report = execute(
            Commands::Sweep {
                retention_hours: Some(1),
            },
            &config(),
            Arc::new(storage.clone()),
            now,
        )
        .await
        .unwrap();

        assert_eq!(report["deleted"], 1);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn usage_and_reset_read_the_ledger() {
        let storage = MemoryStorage::new();
        let config = config();
        let now = Utc::now();
        let ledger = ObjectStoreQuotaLedger::new(Arc::new(storage.clone()), config.quota_policy());
        assert!(ledger.check_and_charge("203.0.113.7", now).await.unwrap());

        let usage = execute(Commands::Usage, &config, Arc::new(storage.clone()), now)
            .await
            .unwrap();
        assert_eq!(usage["clients"]["203.0.113.7"]["count"], 1);
        assert_eq!(usage["objects"], 1);
        assert_eq!(usage["withinCapacity"], true);

        execute(Commands::ResetLimits, &config, Arc::new(storage.clone()), now)
            .await
            .unwrap();
        assert!(storage.is_empty());
    }
}
