//! Per-client upload quota persisted in the object store.

mod ledger;

pub use ledger::ObjectStoreQuotaLedger;
