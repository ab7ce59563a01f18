//! Resolves and fills in `(correlation_id, trace_id, causation_id,
//! parent_event_id)`, the only mutation of the envelope permitted after
//! deserialization. Runs immediately after [`crate::deserializer::Deserializer`].

use crate::middleware::{Decision, Middleware};
use anyhow::Result;
use async_trait::async_trait;
use erp_events_core::ProcessingContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static SPAN_COUNTER: AtomicU64 = AtomicU64::new(0);

fn generate_span_id() -> String {
    let pid = std::process::id();
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let monotonic = SPAN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{pid}-{unix_ms}-{monotonic}")
}

/// Message headers that, when present, take priority over the envelope's own
/// correlation fields.
#[derive(Debug, Default, Clone)]
pub struct CorrelationHeaders {
    pub correlation_id: Option<String>,
    pub trace_id: Option<String>,
    pub causation_id: Option<String>,
    pub parent_event_id: Option<String>,
}

fn parse_uuid(candidate: Option<&str>) -> Option<Uuid> {
    candidate.and_then(|s| Uuid::parse_str(s).ok())
}

pub struct CorrelationHandler {
    headers: CorrelationHeaders,
}

impl CorrelationHandler {
    pub fn new(headers: CorrelationHeaders) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl Middleware for CorrelationHandler {
    fn name(&self) -> &str {
        "correlation_handler"
    }

    async fn before(&self, ctx: &mut ProcessingContext) -> Result<Decision> {
        let Some(envelope) = ctx.envelope.as_mut() else {
            anyhow::bail!("correlation handler requires a populated envelope");
        };

        let correlation_id = parse_uuid(self.headers.correlation_id.as_deref())
            .or(envelope.correlation_id)
            .unwrap_or_else(Uuid::new_v4);
        envelope.correlation_id = Some(correlation_id);

        let causation_id = parse_uuid(self.headers.causation_id.as_deref()).or(envelope.causation_id);
        envelope.causation_id = causation_id;

        let parent_event_id =
            parse_uuid(self.headers.parent_event_id.as_deref()).or(envelope.parent_event_id);
        envelope.parent_event_id = parent_event_id;

        let trace_id = self
            .headers
            .trace_id
            .clone()
            .or_else(|| envelope.trace_id.clone())
            .unwrap_or_else(|| correlation_id.to_string());
        envelope.trace_id = Some(trace_id.clone());

        let span_id = generate_span_id();

        ctx.correlation_id = Some(correlation_id);
        ctx.trace_id = Some(trace_id.clone());
        ctx.span_id = Some(span_id.clone());
        ctx.set_metadata("correlation_id", correlation_id.to_string());
        ctx.set_metadata("trace_id", &trace_id);
        ctx.set_metadata("span_id", &span_id);
        if let Some(causation_id) = causation_id {
            ctx.set_metadata("causation_id", causation_id.to_string());
        }
        if let Some(parent_event_id) = parent_event_id {
            ctx.set_metadata("parent_event_id", parent_event_id.to_string());
        }

        Ok(Decision::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_events_core::{EventEnvelope, Priority};

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
    async fn generates_ids_when_absent() {
        let mw = CorrelationHandler::new(CorrelationHeaders::default());
        let mut ctx = ctx_with(envelope());
        mw.before(&mut ctx).await.unwrap();
        assert!(ctx.correlation_id.is_some());
        let envelope = ctx.envelope.unwrap();
        assert_eq!(envelope.trace_id, Some(ctx.correlation_id.unwrap().to_string()));
    }

    #[tokio::test]
    async fn header_takes_priority_over_envelope_field() {
        let header_id = Uuid::new_v4();
        let mut env = envelope();
        env.correlation_id = Some(Uuid::new_v4());
        let mw = CorrelationHandler::new(CorrelationHeaders {
            correlation_id: Some(header_id.to_string()),
            ..Default::default()
        });
        let mut ctx = ctx_with(env);
        mw.before(&mut ctx).await.unwrap();
        assert_eq!(ctx.correlation_id, Some(header_id));
    }

    #[tokio::test]
    async fn invalid_header_uuid_falls_back_to_envelope() {
        let envelope_id = Uuid::new_v4();
        let mut env = envelope();
        env.correlation_id = Some(envelope_id);
        let mw = CorrelationHandler::new(CorrelationHeaders {
            correlation_id: Some("not-a-uuid".into()),
            ..Default::default()
        });
        let mut ctx = ctx_with(env);
        mw.before(&mut ctx).await.unwrap();
        assert_eq!(ctx.correlation_id, Some(envelope_id));
    }

    #[tokio::test]
    async fn trace_id_defaults_to_correlation_id() {
        let mw = CorrelationHandler::new(CorrelationHeaders::default());
        let mut ctx = ctx_with(envelope());
        mw.before(&mut ctx).await.unwrap();
        assert_eq!(ctx.trace_id, Some(ctx.correlation_id.unwrap().to_string()));
    }

    #[tokio::test]
    async fn span_id_has_expected_shape() {
        let mw = CorrelationHandler::new(CorrelationHeaders::default());
        let mut ctx = ctx_with(envelope());
        mw.before(&mut ctx).await.unwrap();
        let span_id = ctx.span_id.unwrap();
        assert_eq!(span_id.split('-').count(), 3);
    }
}
