//! Quota ledger document.
//!
//! One JSON document holds every period; each period maps a client identifier to its
//! upload counter. The serialized shape is
//! `{"2024-05": {"ipUploads": {"203.0.113.7": {"count": 2, "lastUpload": "..."}}}}`.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::policy::QuotaPolicy;

/// Period key (`YYYY-MM`) for an instant.
pub fn period_key(now: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", now.year(), now.month())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUsage {
    pub count: u32,
    #[serde(rename = "lastUpload", alias = "lastEventAt")]
    pub last_event_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodUsage {
    #[serde(rename = "ipUploads", default)]
    pub clients: BTreeMap<String, ClientUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerDocument {
    pub periods: BTreeMap<String, PeriodUsage>,
}

/// Result of evaluating one charge against a ledger document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The counter was incremented; the document must be written back.
    Charged { count: u32 },
    /// The client reached its limit; the document is unchanged.
    Limited { count: u32 },
}

impl ChargeOutcome {
    pub fn is_charged(self) -> bool {
        matches!(self, ChargeOutcome::Charged { .. })
    }
}

impl LedgerDocument {
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Usage of a client in the period containing `now`.
    pub fn usage(&self, client_id: &str, now: DateTime<Utc>) -> Option<&ClientUsage> {
        self.periods
            .get(&period_key(now))
            .and_then(|period| period.clients.get(client_id))
    }

    /// Apply the window/limit rules for one upload by `client_id` at `now`.
    ///
    /// An absent entry counts as `{count: 0, lastEventAt: now}`. A window that elapsed
    /// (`now - lastEventAt >= window`) resets the count before the limit is evaluated.
    /// The document is only mutated when the outcome is `Charged`.
    pub fn charge(
        &mut self,
        client_id: &str,
        now: DateTime<Utc>,
        policy: &QuotaPolicy,
    ) -> ChargeOutcome {
        let mut usage = self.usage(client_id, now).cloned().unwrap_or(ClientUsage {
            count: 0,
            last_event_at: now,
        });

        if now - usage.last_event_at >= Duration::hours(i64::from(policy.window_hours)) {
            usage.count = 0;
        }

        if usage.count >= policy.max_uploads_per_window {
            return ChargeOutcome::Limited { count: usage.count };
        }

        usage.count += 1;
        usage.last_event_at = now;
        let count = usage.count;

        self.periods
            .entry(period_key(now))
            .or_default()
            .clients
            .insert(client_id.to_string(), usage);

        ChargeOutcome::Charged { count }
    }
}
