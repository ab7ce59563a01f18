//! Validates the envelope (fixed schema) and, if configured, the payload
//! (looked up in a [`SchemaRegistry`] by `(event_type, event_version)`)
//! before handler dispatch.

use crate::middleware::{Decision, Middleware};
use anyhow::Result;
use async_trait::async_trait;
use erp_events_core::{ClassifiedError, ErrorSeverity, ErrorTag, ProcessingContext};
use erp_events_schema::{SchemaError, SchemaRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SchemaValidatorConfig {
    pub enabled: bool,
    pub throw_on_error: bool,
    pub validate_envelope: bool,
    pub validate_payload: bool,
}

impl Default for SchemaValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            throw_on_error: true,
            validate_envelope: true,
            validate_payload: true,
        }
    }
}

pub struct SchemaValidator {
    registry: Arc<SchemaRegistry>,
    config: SchemaValidatorConfig,
}

impl SchemaValidator {
    pub fn new(registry: Arc<SchemaRegistry>, config: SchemaValidatorConfig) -> Self {
        Self { registry, config }
    }
}

fn classify(err: SchemaError) -> ClassifiedError {
    let (message, context) = match &err {
        SchemaError::Validation { key, violations } => (
            format!("schema validation failed for {key}"),
            serde_json::to_value(violations).unwrap_or_default(),
        ),
        other => (other.to_string(), serde_json::Value::Null),
    };
    ClassifiedError::new(ErrorTag::SchemaValidation, message)
        .with_severity(ErrorSeverity::Medium)
        .with_context("violations", context)
}

#[async_trait]
impl Middleware for SchemaValidator {
    fn name(&self) -> &str {
        "schema_validator"
    }

    async fn before(&self, ctx: &mut ProcessingContext) -> Result<Decision> {
        if !self.config.enabled {
            return Ok(Decision::Continue);
        }

        let Some(envelope) = ctx.envelope.as_ref() else {
            anyhow::bail!("schema validator requires a populated envelope");
        };

        let mut failure = None;

        if self.config.validate_envelope {
            let instance = serde_json::to_value(envelope)?;
            if let Err(err) = self.registry.validate_envelope(&instance) {
                failure = Some(classify(err));
            }
        }

        if failure.is_none() && self.config.validate_payload {
            if let Err(err) = self.registry.validate_payload(
                &envelope.event_type,
                &envelope.event_version,
                &envelope.payload,
            ) {
                failure = Some(classify(err));
            }
        }

        let Some(err) = failure else {
            return Ok(Decision::Continue);
        };

        if self.config.throw_on_error {
            ctx.should_reject = true;
            ctx.error = Some(err);
            Ok(Decision::Skip)
        } else {
            tracing::warn!(target: "erp_events.schema_validator", error = %err, "recording and continuing");
            ctx.error = Some(err);
            Ok(Decision::Continue)
        }
    }
}
