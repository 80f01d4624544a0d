pub mod decision;
pub mod ledger;
pub mod object;
pub mod policy;

pub use decision::IngestionDecision;
pub use ledger::{period_key, ChargeOutcome, ClientUsage, LedgerDocument, PeriodUsage};
pub use object::{ObjectRole, StoredObject};
pub use policy::{CapacityPolicy, IngestionPolicy, QuotaPolicy, SweepPolicy};
