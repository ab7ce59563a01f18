//! [`ProcessingContext`]: the per-message, mutable state threaded through the
//! middleware pipeline for a single delivery.

use crate::envelope::EventEnvelope;
use crate::error::ClassifiedError;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// Per-message processing state, created by the Consumer for each delivery
/// and discarded after ack/nack. Never shared across deliveries.
pub struct ProcessingContext {
    /// Raw message bytes as received from the broker.
    pub raw_content: Vec<u8>,
    /// Broker-reported content type (e.g. `"application/json; charset=utf-8"`).
    pub content_type: Option<String>,
    /// Populated by the deserializer middleware.
    pub envelope: Option<EventEnvelope>,
    pub correlation_id: Option<Uuid>,
    pub trace_id: Option<String>,
    /// `"<pid>-<unix_ms>-<monotonic>"`, generated by the correlation handler.
    pub span_id: Option<String>,
    pub start_time: Instant,
    /// 1-based attempt count for this delivery.
    pub retry_attempt: u32,
    /// When set, the pipeline short-circuits remaining middleware and handler
    /// dispatch while still succeeding (e.g. a duplicate-event hit).
    pub skip_remaining: bool,
    /// When set, the runtime will nack without requeue regardless of the
    /// otherwise-computed retry decision.
    pub should_reject: bool,
    /// Classified error populated by any middleware or the handler.
    pub error: Option<ClassifiedError>,
    /// Typed cross-middleware scratch space (correlation context, span id,
    /// idempotency-skipped flag, …).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ProcessingContext {
    /// Create a context for a freshly received delivery.
    pub fn new(raw_content: Vec<u8>, content_type: Option<String>, retry_attempt: u32) -> Self {
        Self {
            raw_content,
            content_type,
            envelope: None,
            correlation_id: None,
            trace_id: None,
            span_id: None,
            start_time: Instant::now(),
            retry_attempt,
            skip_remaining: false,
            should_reject: false,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Elapsed time since the context was created, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Record a metadata value, overwriting any previous entry under `key`.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl serde::Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
    }

    /// Read a metadata value back as a boolean flag, defaulting to `false`.
    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_sane_defaults() {
        let ctx = ProcessingContext::new(b"{}".to_vec(), Some("application/json".into()), 1);
        assert!(ctx.envelope.is_none());
        assert!(!ctx.skip_remaining);
        assert!(!ctx.should_reject);
        assert_eq!(ctx.retry_attempt, 1);
    }

    #[test]
    fn metadata_round_trips_through_json_value() {
        let mut ctx = ProcessingContext::new(Vec::new(), None, 1);
        ctx.set_metadata("idempotency_skipped", true);
        assert!(ctx.metadata_flag("idempotency_skipped"));
        assert!(!ctx.metadata_flag("absent_key"));
    }
}
