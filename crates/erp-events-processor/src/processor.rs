//! Runs the middleware pipeline, dispatches the selected handler, and
//! computes a [`ProcessingResult`]. Grounded on the teacher's top-level
//! `Runtime` (owns a registry plus a metrics `Arc`, exposes a stats
//! accessor).

use crate::registry::HandlerRegistry;
use crate::stats::{ProcessorStats, StatsSnapshot};
use erp_events_core::{ClassifiedErrorDto, ProcessingContext, ProcessingResult};
use erp_events_middleware::Pipeline;
use std::sync::Arc;

pub struct Processor {
    pipeline: Pipeline,
    registry: HandlerRegistry,
    stats: Arc<ProcessorStats>,
}

impl Processor {
    pub fn new(pipeline: Pipeline, registry: HandlerRegistry) -> Self {
        Self {
            pipeline,
            registry,
            stats: Arc::new(ProcessorStats::new()),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run the middleware chain then dispatch the selected handler against
    /// `ctx`, returning the computed [`ProcessingResult`]. Never panics on a
    /// handler/middleware error; that error is captured in the result.
    pub async fn process(&self, mut ctx: ProcessingContext) -> ProcessingResult {
        let registry = &self.registry;
        let result = self
            .pipeline
            .run(&mut ctx, move |ctx| {
                Box::pin(async move { dispatch(registry, ctx).await })
            })
            .await;

        let duration_ms = ctx.elapsed_ms();
        let retry_count = ctx.retry_attempt.saturating_sub(1);

        let outcome = match result {
            Ok(()) => {
                let success = !ctx.should_reject;
                self.stats.record(duration_ms, success, retry_count);
                ProcessingResult {
                    success,
                    acknowledged: success,
                    duration_ms,
                    retry_count,
                    error: ctx.error.as_ref().map(ClassifiedErrorDto::from),
                    data: None,
                }
            }
            Err(err) => {
                self.stats.record(duration_ms, false, retry_count);
                let classified = ctx
                    .error
                    .as_ref()
                    .map(ClassifiedErrorDto::from)
                    .unwrap_or_else(|| {
                        ClassifiedErrorDto::from(&erp_events_core::ClassifiedError::new(
                            erp_events_core::ErrorTag::Transient,
                            err.to_string(),
                        ))
                    });
                ProcessingResult::failure(duration_ms, retry_count, classified)
            }
        };

        let event_id = ctx.envelope.as_ref().map(|e| e.event_id.to_string());
        let event_type = ctx.envelope.as_ref().map(|e| e.event_type.clone());
        tracing::info!(
            target: "erp_events.processor",
            event_id = event_id.as_deref().unwrap_or("unknown"),
            event_type = event_type.as_deref().unwrap_or("unknown"),
            duration_ms,
            success = outcome.success,
            acknowledged = outcome.acknowledged,
            "delivery processed"
        );

        outcome
    }
}

async fn dispatch(registry: &HandlerRegistry, ctx: &mut ProcessingContext) -> anyhow::Result<()> {
    let Some(envelope) = ctx.envelope.as_ref() else {
        anyhow::bail!("handler dispatch requires a populated envelope");
    };
    let event_type = envelope.event_type.clone();
    let event_version = envelope.event_version.clone();

    let Some(handler) = registry.select(&event_type, &event_version) else {
        tracing::warn!(
            target: "erp_events.processor",
            event_type = %event_type,
            event_version = %event_version,
            "no handler registered, acking without dispatch"
        );
        return Ok(());
    };

    match handler.handle(ctx).await {
        Ok(()) => Ok(()),
        Err(classified) => {
            ctx.error = Some(classified);
            anyhow::bail!(ctx.error.as_ref().unwrap().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_events_core::{ErrorTag, EventEnvelope, Priority};
    use erp_events_middleware::{Decision, Middleware};
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

    struct PassThrough;

    #[async_trait::async_trait]
    impl Middleware for PassThrough {
        fn name(&self) -> &str {
            "pass_through"
        }
        async fn before(&self, _ctx: &mut ProcessingContext) -> anyhow::Result<Decision> {
            Ok(Decision::Continue)
        }
    }

    #[tokio::test]
    async fn successful_dispatch_is_acknowledged() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            erp_events_core::HandlerKey::new("orders.created", Some("v1".into()), "billing"),
            |_ctx: &mut ProcessingContext| Ok(()),
        );
        let pipeline = Pipeline::new().stage(PassThrough);
        let processor = Processor::new(pipeline, registry);
        let result = processor.process(ctx_with(envelope())).await;
        assert!(result.success);
        assert!(result.acknowledged);
        assert_eq!(processor.stats().processed, 1);
    }

    #[tokio::test]
    async fn missing_handler_still_acknowledges() {
        let registry = HandlerRegistry::new();
        let pipeline = Pipeline::new().stage(PassThrough);
        let processor = Processor::new(pipeline, registry);
        let result = processor.process(ctx_with(envelope())).await;
        assert!(result.success);
        assert!(result.acknowledged);
    }

    #[tokio::test]
    async fn handler_error_is_not_acknowledged() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            erp_events_core::HandlerKey::new("orders.created", Some("v1".into()), "billing"),
            |_ctx: &mut ProcessingContext| {
                Err(erp_events_core::ClassifiedError::new(ErrorTag::Transient, "boom"))
            },
        );
        let pipeline = Pipeline::new().stage(PassThrough);
        let processor = Processor::new(pipeline, registry);
        let result = processor.process(ctx_with(envelope())).await;
        assert!(!result.success);
        assert!(!result.acknowledged);
        assert_eq!(processor.stats().failed, 1);
    }
}
