//! The fixed, hard-coded envelope schema (distinct from the per-event
//! payload schemas resolved through [`crate::registry::SchemaRegistry`]).
//!
//! Hand-written rather than derived from [`erp_events_core::EventEnvelope`]
//! via `schemars`, since the envelope's pattern invariants (`event_type`,
//! `event_version`) and UUID-format checks are schema-level constraints the
//! derive macro cannot express on its own.

use jsonschema::Validator;
use serde_json::{Value, json};
use std::sync::OnceLock;

static ENVELOPE_VALIDATOR: OnceLock<Validator> = OnceLock::new();

/// The fixed envelope schema as a JSON value.
pub fn envelope_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "EventEnvelope",
        "type": "object",
        "required": [
            "event_id", "event_type", "event_version", "occurred_at",
            "producer", "priority", "payload"
        ],
        "properties": {
            "event_id": { "type": "string", "format": "uuid" },
            "event_type": {
                "type": "string",
                "pattern": "^[a-z][a-z0-9-]*\\.[a-z][a-z0-9-]*$"
            },
            "event_version": { "type": "string", "pattern": "^v\\d+$" },
            "occurred_at": { "type": "string", "format": "date-time" },
            "producer": { "type": "string", "minLength": 1 },
            "producer_version": { "type": "string" },
            "producer_instance": { "type": "string" },
            "correlation_id": { "type": "string", "format": "uuid" },
            "causation_id": { "type": "string", "format": "uuid" },
            "parent_event_id": { "type": "string", "format": "uuid" },
            "trace_id": { "type": "string" },
            "routing_key": { "type": "string" },
            "priority": {
                "type": "string",
                "enum": ["low", "normal", "high", "critical"]
            },
            "payload": { "type": "object" },
            "metadata": { "type": "object" }
        }
    })
}

/// Compile (once) and return the envelope validator.
pub fn envelope_validator() -> &'static Validator {
    ENVELOPE_VALIDATOR
        .get_or_init(|| jsonschema::validator_for(&envelope_schema()).expect("envelope schema compiles"))
}
