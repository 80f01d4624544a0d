//! Storage capacity gate
//!
//! This module checks aggregate object store usage against the configured ceiling.

pub use storage_gate::{StorageCapacityGate, StorageUsage};

mod storage_gate;
