//! An in-process, non-durable [`ProcessedEventStore`] for tests and for
//! `erp-events-cli`'s offline `validate-config` path — a second, swappable
//! persistence strategy in the spirit of the teacher's
//! `abp-runtime::store::ReceiptStore` standing alongside its primary
//! persistence mechanism.

use crate::error::StoreError;
use crate::port::ProcessedEventStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erp_events_core::{CheckResult, OutcomeUpdate, ProcessingOutcome, ProcessingStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Clone)]
struct Row {
    event_type: String,
    status: ProcessingStatus,
    processed_at: Option<DateTime<Utc>>,
    processing_attempts: i32,
    result: Option<ProcessingOutcome>,
    output: Option<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

/// Non-durable store, useful for tests and the CLI's offline paths. State is
/// lost on process restart — never use this for a running consumer against a
/// real broker.
#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    rows: Mutex<HashMap<(String, Uuid), Row>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn check(&self, consumer: &str, event_id: Uuid) -> Result<CheckResult, StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        let rows = self.rows.lock().unwrap();
        let Some(row) = rows.get(&(consumer.to_string(), event_id)) else {
            return Ok(CheckResult::default());
        };
        Ok(CheckResult {
            processed: true,
            processed_at: row.processed_at,
            attempts: Some(row.processing_attempts),
            output: row.output.clone(),
        })
    }

    async fn mark_in_progress(
        &self,
        consumer: &str,
        event_id: Uuid,
        event_type: &str,
    ) -> Result<(), StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        let mut rows = self.rows.lock().unwrap();
        rows.entry((consumer.to_string(), event_id))
            .or_insert_with(|| Row {
                event_type: event_type.to_string(),
                status: ProcessingStatus::InProgress,
                processed_at: None,
                processing_attempts: 0,
                result: None,
                output: None,
                updated_at: Utc::now(),
            });
        Ok(())
    }

    async fn record_outcome(
        &self,
        consumer: &str,
        event_id: Uuid,
        update: OutcomeUpdate,
    ) -> Result<(), StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry((consumer.to_string(), event_id))
            .or_insert_with(|| Row {
                event_type: String::new(),
                status: ProcessingStatus::InProgress,
                processed_at: None,
                processing_attempts: 0,
                result: None,
                output: None,
                updated_at: Utc::now(),
            });
        row.status = update.status;
        row.processed_at = Some(Utc::now());
        row.processing_attempts += 1;
        row.result = Some(update.result);
        row.output = update.output;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn reset(&self, consumer: &str, event_id: Uuid) -> Result<(), StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        self.rows
            .lock()
            .unwrap()
            .remove(&(consumer.to_string(), event_id));
        Ok(())
    }

    async fn prune(&self, consumer: &str, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|(c, _), row| c != consumer || row.updated_at >= older_than);
        Ok((before - rows.len()) as u64)
    }
}
