//! `sqlx`/PostgreSQL-backed [`ProcessedEventStore`]. The `INSERT … ON
//! CONFLICT (consumer_name, event_id) DO NOTHING` upsert pattern mirrors the
//! one used by `other_examples`'s Kafka idempotent-consumer library, adapted
//! to the two-part `(consumer_name, event_id)` key this runtime requires.

use crate::error::StoreError;
use crate::port::ProcessedEventStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erp_events_core::{CheckResult, OutcomeUpdate, ProcessingOutcome, ProcessingStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Store implementation backed by a `processed_events` table (see
/// `migrations/0001_processed_events.sql`).
#[derive(Clone)]
pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations against `pool`.
    pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }
}

fn status_str(status: ProcessingStatus) -> &'static str {
    match status {
        ProcessingStatus::InProgress => "in_progress",
        ProcessingStatus::Completed => "completed",
        ProcessingStatus::Failed => "failed",
    }
}

fn outcome_str(outcome: ProcessingOutcome) -> &'static str {
    match outcome {
        ProcessingOutcome::Success => "success",
        ProcessingOutcome::Failed => "failed",
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn check(&self, consumer: &str, event_id: Uuid) -> Result<CheckResult, StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        let row = sqlx::query(
            r#"
            SELECT processed_at, processing_attempts, output
            FROM processed_events
            WHERE consumer_name = $1 AND event_id = $2
            "#,
        )
        .bind(consumer)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(CheckResult::default());
        };

        Ok(CheckResult {
            processed: true,
            processed_at: row.try_get("processed_at")?,
            attempts: row.try_get("processing_attempts")?,
            output: row.try_get("output")?,
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
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, consumer_name, status)
            VALUES ($1, $2, $3, 'in_progress')
            ON CONFLICT (consumer_name, event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(consumer)
        .execute(&self.pool)
        .await?;
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
        sqlx::query(
            r#"
            UPDATE processed_events
            SET status = $3,
                processed_at = now(),
                processing_duration_ms = $4,
                processing_attempts = processing_attempts + 1,
                result = $5,
                output = $6,
                error_message = $7,
                error_code = $8,
                updated_at = now()
            WHERE consumer_name = $1 AND event_id = $2
            "#,
        )
        .bind(consumer)
        .bind(event_id)
        .bind(status_str(update.status))
        .bind(update.duration_ms as i32)
        .bind(outcome_str(update.result))
        .bind(update.output)
        .bind(update.error_message)
        .bind(update.error_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset(&self, consumer: &str, event_id: Uuid) -> Result<(), StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        sqlx::query("DELETE FROM processed_events WHERE consumer_name = $1 AND event_id = $2")
            .bind(consumer)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune(&self, consumer: &str, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        if consumer.is_empty() {
            return Err(StoreError::EmptyConsumerName);
        }
        let result = sqlx::query(
            "DELETE FROM processed_events WHERE consumer_name = $1 AND updated_at < $2",
        )
        .bind(consumer)
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
