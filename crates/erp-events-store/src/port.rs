//! The small port the idempotency guard depends on (`spec.md` §9: "Database
//! access in the idempotency store should be behind a small port with the
//! five operations"). Any relational engine with an `INSERT … ON CONFLICT DO
//! NOTHING` equivalent can back it; see [`crate::postgres`] and
//! [`crate::memory`] for the two implementations this crate ships.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erp_events_core::{CheckResult, OutcomeUpdate};
use uuid::Uuid;

#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Look up the row for `(consumer, event_id)`. Must not raise on absence
    /// — absence is represented by `CheckResult::default()`.
    async fn check(&self, consumer: &str, event_id: Uuid) -> Result<CheckResult, StoreError>;

    /// Insert a row with status `in_progress`. A no-op on an existing key —
    /// the prior row wins; the caller learns of the duplicate via the
    /// subsequent `check`.
    async fn mark_in_progress(
        &self,
        consumer: &str,
        event_id: Uuid,
        event_type: &str,
    ) -> Result<(), StoreError>;

    /// Update the row to a terminal status, incrementing
    /// `processing_attempts` and setting `updated_at = now`.
    async fn record_outcome(
        &self,
        consumer: &str,
        event_id: Uuid,
        update: OutcomeUpdate,
    ) -> Result<(), StoreError>;

    /// Delete the row for `(consumer, event_id)` (manual re-drive).
    async fn reset(&self, consumer: &str, event_id: Uuid) -> Result<(), StoreError>;

    /// Remove rows with `updated_at < older_than` for `consumer`. Returns the
    /// number of rows removed.
    async fn prune(&self, consumer: &str, older_than: DateTime<Utc>) -> Result<u64, StoreError>;
}
