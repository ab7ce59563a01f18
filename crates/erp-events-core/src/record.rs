//! Durable row types backing the processed-events idempotency store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a processed-event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    InProgress,
    Completed,
    Failed,
}

/// Terminal outcome of a processed-event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Success,
    Failed,
}

/// A durable row keyed by `(consumer_name, event_id)`, unique.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessedEventRecord {
    pub event_id: uuid::Uuid,
    pub event_type: String,
    pub consumer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_group: Option<String>,
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_duration_ms: Option<i64>,
    pub processing_attempts: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Input to `ProcessedEventStore::record_outcome`.
#[derive(Debug, Clone)]
pub struct OutcomeUpdate {
    pub status: ProcessingStatus,
    pub duration_ms: i64,
    pub result: ProcessingOutcome,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

/// Result of `ProcessedEventStore::check`.
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub processed: bool,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub attempts: Option<i32>,
    pub output: Option<serde_json::Value>,
}

/// The outcome the event processor hands back up to the Consumer (see the
/// `erp-events-processor` crate).
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub success: bool,
    /// Whether the Consumer should `ack` (vs. `nack`) this delivery.
    pub acknowledged: bool,
    pub duration_ms: u64,
    pub retry_count: u32,
    pub error: Option<crate::error::ClassifiedErrorDto>,
    pub data: Option<serde_json::Value>,
}

impl ProcessingResult {
    /// A successful, acknowledged result.
    pub fn success(duration_ms: u64, retry_count: u32, data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            acknowledged: true,
            duration_ms,
            retry_count,
            error: None,
            data,
        }
    }

    /// A failed result; `acknowledged` is always `false` for failures — the
    /// Consumer decides nack(requeue) vs nack(no-requeue) from `error`.
    pub fn failure(
        duration_ms: u64,
        retry_count: u32,
        error: crate::error::ClassifiedErrorDto,
    ) -> Self {
        Self {
            success: false,
            acknowledged: false,
            duration_ms,
            retry_count,
            error: Some(error),
            data: None,
        }
    }
}
