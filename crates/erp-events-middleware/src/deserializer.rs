//! Parses and size/content-type checks the raw delivery, populating
//! `ctx.envelope`. The first middleware in every pipeline — everything
//! downstream assumes `ctx.envelope` is `Some`.

use crate::middleware::{Decision, Middleware};
use anyhow::Result;
use async_trait::async_trait;
use erp_events_core::{ClassifiedError, ErrorTag, EventEnvelope, ProcessingContext};

const DEFAULT_MAX_SIZE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DeserializerConfig {
    pub max_size_bytes: usize,
    pub enforce_content_type: bool,
}

impl Default for DeserializerConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            enforce_content_type: true,
        }
    }
}

pub struct Deserializer {
    config: DeserializerConfig,
}

impl Deserializer {
    pub fn new(config: DeserializerConfig) -> Self {
        Self { config }
    }
}

fn content_type_base(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or(content_type).trim()
}

fn reject(ctx: &mut ProcessingContext, err: ClassifiedError) -> Decision {
    ctx.should_reject = true;
    ctx.error = Some(err);
    Decision::Skip
}

#[async_trait]
impl Middleware for Deserializer {
    fn name(&self) -> &str {
        "deserializer"
    }

    async fn before(&self, ctx: &mut ProcessingContext) -> Result<Decision> {
        if ctx.raw_content.len() > self.config.max_size_bytes {
            return Ok(reject(
                ctx,
                ClassifiedError::new(
                    ErrorTag::Validation,
                    format!(
                        "message of {} bytes exceeds max_size_bytes ({})",
                        ctx.raw_content.len(),
                        self.config.max_size_bytes
                    ),
                ),
            ));
        }

        if self.config.enforce_content_type {
            match ctx.content_type.as_deref().map(content_type_base) {
                Some("application/json") => {}
                Some(other) => {
                    tracing::warn!(target: "erp_events.deserializer", content_type = other, "unexpected content type, continuing");
                }
                None => {
                    tracing::warn!(target: "erp_events.deserializer", "missing content type, continuing");
                }
            }
        }

        let value: serde_json::Value = match serde_json::from_slice(&ctx.raw_content) {
            Ok(v) => v,
            Err(e) => {
                return Ok(reject(
                    ctx,
                    ClassifiedError::new(ErrorTag::Validation, format!("invalid JSON: {e}")),
                ));
            }
        };

        if !value.is_object() {
            return Ok(reject(
                ctx,
                ClassifiedError::new(ErrorTag::Validation, "message body must be a JSON object"),
            ));
        }

        let envelope: EventEnvelope = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                return Ok(reject(
                    ctx,
                    ClassifiedError::new(ErrorTag::Validation, format!("malformed envelope: {e}")),
                ));
            }
        };

        if envelope.event_type.trim().is_empty() {
            return Ok(reject(
                ctx,
                ClassifiedError::new(ErrorTag::Validation, "event_type must not be empty"),
            ));
        }

        ctx.envelope = Some(envelope);
        Ok(Decision::Continue)
    }
}
