//! The last middleware before handler dispatch: short-circuits duplicate
//! deliveries and records the terminal outcome around `next()`. Store
//! failures fail open (process the event) so a broker-side consumer is never
//! blocked behind idempotency-store availability.

use crate::idempotency_cache::IdempotencyCache;
use crate::middleware::{Decision, Middleware};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use erp_events_core::{ClassifiedError, OutcomeUpdate, ProcessingContext, ProcessingOutcome, ProcessingStatus};
use erp_events_store::ProcessedEventStore;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Metadata key set in `before` only on the path that actually called
/// `mark_in_progress`, so `after`/`on_error` don't re-record a terminal
/// outcome for a delivery that was short-circuited as a duplicate.
const MARKED_IN_PROGRESS_KEY: &str = "idempotency_guard.marked_in_progress";

#[derive(Debug, Clone)]
pub struct IdempotencyGuardConfig {
    pub consumer_name: String,
    pub cache_capacity: usize,
    /// Minimum time between best-effort `prune` calls.
    pub prune_interval_seconds: i64,
    pub prune_older_than_seconds: i64,
}

impl IdempotencyGuardConfig {
    pub fn new(consumer_name: impl Into<String>) -> Self {
        Self {
            consumer_name: consumer_name.into(),
            cache_capacity: 1000,
            prune_interval_seconds: 3600,
            prune_older_than_seconds: 7 * 24 * 3600,
        }
    }
}

pub struct IdempotencyGuard {
    store: Arc<dyn ProcessedEventStore>,
    cache: IdempotencyCache,
    config: IdempotencyGuardConfig,
    last_prune_unix: AtomicI64,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn ProcessedEventStore>, config: IdempotencyGuardConfig) -> Self {
        let cache = IdempotencyCache::new(config.cache_capacity);
        Self {
            store,
            cache,
            config,
            last_prune_unix: AtomicI64::new(0),
        }
    }

    async fn maybe_prune(&self) {
        let now = Utc::now().timestamp();
        let last = self.last_prune_unix.load(Ordering::Relaxed);
        if now - last < self.config.prune_interval_seconds {
            return;
        }
        self.last_prune_unix.store(now, Ordering::Relaxed);
        let cutoff = Utc::now() - ChronoDuration::seconds(self.config.prune_older_than_seconds);
        if let Err(err) = self.store.prune(&self.config.consumer_name, cutoff).await {
            tracing::warn!(target: "erp_events.idempotency_guard", error = %err, "best-effort prune failed");
        }
    }
}

#[async_trait]
impl Middleware for IdempotencyGuard {
    fn name(&self) -> &str {
        "idempotency_guard"
    }

    async fn before(&self, ctx: &mut ProcessingContext) -> Result<Decision> {
        let Some(event_id) = ctx.envelope.as_ref().map(|e| e.event_id) else {
            anyhow::bail!("idempotency guard requires a populated envelope");
        };
        let event_type = ctx.envelope.as_ref().unwrap().event_type.clone();
        let consumer = self.config.consumer_name.as_str();

        if self.cache.contains(consumer, event_id) {
            ctx.skip_remaining = true;
            ctx.error = Some(ClassifiedError::duplicate(event_id.to_string()));
            return Ok(Decision::Skip);
        }

        match self.store.check(consumer, event_id).await {
            Ok(result) if result.processed => {
                self.cache.insert(consumer, event_id);
                ctx.skip_remaining = true;
                ctx.error = Some(ClassifiedError::duplicate(event_id.to_string()));
                return Ok(Decision::Skip);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(target: "erp_events.idempotency_guard", error = %err, "store check failed, failing open");
            }
        }

        if let Err(err) = self
            .store
            .mark_in_progress(consumer, event_id, &event_type)
            .await
        {
            tracing::warn!(target: "erp_events.idempotency_guard", error = %err, "mark_in_progress failed, failing open");
        }
        ctx.set_metadata(MARKED_IN_PROGRESS_KEY, true);

        Ok(Decision::Continue)
    }

    async fn after(&self, ctx: &mut ProcessingContext) -> Result<()> {
        if !ctx.metadata_flag(MARKED_IN_PROGRESS_KEY) {
            // This delivery was a duplicate short-circuited in `before`; the
            // terminal outcome was already recorded (or never started) for
            // the original attempt, so recording again here would bump
            // `processing_attempts` for a message that was never reprocessed.
            self.maybe_prune().await;
            return Ok(());
        }
        let event_id = ctx.envelope.as_ref().map(|e| e.event_id);
        if let Some(event_id) = event_id {
            let consumer = self.config.consumer_name.as_str();
            self.cache.insert(consumer, event_id);
            let update = OutcomeUpdate {
                status: ProcessingStatus::Completed,
                duration_ms: ctx.elapsed_ms() as i64,
                result: ProcessingOutcome::Success,
                output: None,
                error_message: None,
                error_code: None,
            };
            if let Err(err) = self.store.record_outcome(consumer, event_id, update).await {
                tracing::warn!(target: "erp_events.idempotency_guard", error = %err, "record_outcome (success) failed");
            }
        }
        self.maybe_prune().await;
        Ok(())
    }

    async fn on_error(&self, ctx: &mut ProcessingContext, err: &anyhow::Error) -> Result<()> {
        if !ctx.metadata_flag(MARKED_IN_PROGRESS_KEY) {
            self.maybe_prune().await;
            return Ok(());
        }
        let event_id = ctx.envelope.as_ref().map(|e| e.event_id);
        if let Some(event_id) = event_id {
            let consumer = self.config.consumer_name.as_str();
            let update = OutcomeUpdate {
                status: ProcessingStatus::Failed,
                duration_ms: ctx.elapsed_ms() as i64,
                result: ProcessingOutcome::Failed,
                output: None,
                error_message: Some(err.to_string()),
                error_code: ctx.error.as_ref().map(|e| e.tag.as_str().to_string()),
            };
            if let Err(store_err) = self.store.record_outcome(consumer, event_id, update).await {
                tracing::warn!(target: "erp_events.idempotency_guard", error = %store_err, "record_outcome (failure) failed");
            }
        }
        self.maybe_prune().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_events_core::{EventEnvelope, Priority};
    use erp_events_store::InMemoryProcessedEventStore;
    use uuid::Uuid;

    fn envelope() -> EventEnvelope {
        EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: "orders.created".into(),
            event_version: "v1".into(),
            occurred_at: chrono::Utc::now(),
            producer: "order-service".into(),
            producer_version: None,
            producer_instance: None,
            correlation_id: None,
            causation_id: None,
            parent_event_id: None,
            trace_id: None,
            routing_key: None,
            priority: Priority::Normal,
            payload: serde_json::json!({}),
            metadata: None,
        }
    }

    fn ctx_with(envelope: EventEnvelope) -> ProcessingContext {
        let mut c = ProcessingContext::new(Vec::new(), None, 1);
        c.envelope = Some(envelope);
        c
    }

    #[tokio::test]
    async fn first_delivery_continues_and_marks_in_progress() {
        let store: Arc<dyn ProcessedEventStore> = Arc::new(InMemoryProcessedEventStore::new());
        let guard = IdempotencyGuard::new(store.clone(), IdempotencyGuardConfig::new("billing"));
        let env = envelope();
        let event_id = env.event_id;
        let mut ctx = ctx_with(env);
        let decision = guard.before(&mut ctx).await.unwrap();
        assert_eq!(decision, Decision::Continue);
        let check = store.check("billing", event_id).await.unwrap();
        assert!(check.processed);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_skipped_via_store() {
        let store: Arc<dyn ProcessedEventStore> = Arc::new(InMemoryProcessedEventStore::new());
        let guard = IdempotencyGuard::new(store.clone(), IdempotencyGuardConfig::new("billing"));
        let env = envelope();
        let event_id = env.event_id;

        let mut first = ctx_with(env.clone());
        guard.before(&mut first).await.unwrap();
        guard.after(&mut first).await.unwrap();

        let mut second = ctx_with(env);
        let decision = guard.before(&mut second).await.unwrap();
        assert_eq!(decision, Decision::Skip);
        assert!(second.skip_remaining);
        assert_eq!(second.error.unwrap().tag, erp_events_core::ErrorTag::DuplicateEvent);
        let _ = event_id;
    }

    #[tokio::test]
    async fn duplicate_delivery_is_skipped_via_cache_without_store_round_trip() {
        let store: Arc<dyn ProcessedEventStore> = Arc::new(InMemoryProcessedEventStore::new());
        let guard = IdempotencyGuard::new(store.clone(), IdempotencyGuardConfig::new("billing"));
        let env = envelope();

        let mut first = ctx_with(env.clone());
        guard.before(&mut first).await.unwrap();
        guard.after(&mut first).await.unwrap();

        // Delete the store row; the cache should still short-circuit.
        store.reset("billing", env.event_id).await.unwrap();

        let mut second = ctx_with(env);
        let decision = guard.before(&mut second).await.unwrap();
        assert_eq!(decision, Decision::Skip);
    }

    #[tokio::test]
    async fn on_error_records_failed_outcome() {
        let store: Arc<dyn ProcessedEventStore> = Arc::new(InMemoryProcessedEventStore::new());
        let guard = IdempotencyGuard::new(store.clone(), IdempotencyGuardConfig::new("billing"));
        let env = envelope();
        let event_id = env.event_id;
        let mut ctx = ctx_with(env);
        guard.before(&mut ctx).await.unwrap();
        guard
            .on_error(&mut ctx, &anyhow::anyhow!("handler exploded"))
            .await
            .unwrap();
        let check = store.check("billing", event_id).await.unwrap();
        assert_eq!(check.attempts, Some(1));
    }
}
