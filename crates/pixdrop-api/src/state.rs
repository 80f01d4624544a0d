//! Application state shared by every handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pixdrop_core::{CapacityGate, Config, QuotaLedger};
use pixdrop_services::{
    IngestionGate, LifecycleSweeper, MediaService, ObjectStoreQuotaLedger, Storage,
    StorageCapacityGate,
};

/// Source of the current time for quota decisions.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub media: MediaService,
    pub ledger: Arc<ObjectStoreQuotaLedger>,
    pub sweeper: Arc<LifecycleSweeper>,
    clock: Clock,
}

impl AppState {
    /// Wire the gates and services over `storage` using the policies in `config`.
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Self {
        let ledger = Arc::new(ObjectStoreQuotaLedger::new(
            storage.clone(),
            config.quota_policy(),
        ));
        let capacity = Arc::new(StorageCapacityGate::new(
            storage.clone(),
            config.capacity_policy(),
        ));
        let ingestion_policy = config.ingestion_policy();
        let gate = IngestionGate::new(
            &ingestion_policy,
            ledger.clone() as Arc<dyn QuotaLedger>,
            capacity as Arc<dyn CapacityGate>,
        );
        let media = MediaService::new(
            storage.clone(),
            gate,
            &ingestion_policy,
            config.presigned_url_expiry(),
        );
        let sweeper = Arc::new(LifecycleSweeper::new(storage.clone(), config.sweep_policy()));

        Self {
            config,
            storage,
            media,
            ledger,
            sweeper,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}
