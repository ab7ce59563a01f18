//! The [`EventEnvelope`] transported as JSON over the broker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Business-flow priority. Does not affect broker routing by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

/// The standardized transport wrapper carrying event metadata and payload.
///
/// Immutable after deserialization, with one exception: the correlation
/// handler (`erp-events-middleware`) may fill in `correlation_id`,
/// `trace_id`, `causation_id`, and `parent_event_id` when absent. No other
/// component mutates an envelope.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EventEnvelope {
    /// Unique per event instance.
    pub event_id: Uuid,
    /// `"<domain>.<action>"`, lowercase dotted identifier.
    pub event_type: String,
    /// `"v<N>"`, monotonic integer.
    pub event_version: String,
    /// RFC 3339 timestamp.
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub producer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_instance: Option<String>,
    /// Identifies a business flow across services. Always populated once the
    /// correlation handler has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// UUID of the event that caused this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    /// UUID forming the causation chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<Uuid>,
    /// Opaque distributed-trace identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Broker routing key echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
    pub priority: Priority,
    /// Schema determined by `(event_type, event_version)`.
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Whether `event_type` matches `^[a-z][a-z0-9-]*\.[a-z][a-z0-9-]*$`.
pub fn is_valid_event_type(event_type: &str) -> bool {
    let Some((domain, action)) = event_type.split_once('.') else {
        return false;
    };
    is_valid_dotted_segment(domain) && is_valid_dotted_segment(action) && !action.contains('.')
}

fn is_valid_dotted_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Whether `event_version` matches `^v\d+$`.
pub fn is_valid_event_version(event_version: &str) -> bool {
    event_version
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_pattern() {
        assert!(is_valid_event_type("orders.created"));
        assert!(is_valid_event_type("inventory-sync.adjust-stock"));
        assert!(!is_valid_event_type("Orders.Created"));
        assert!(!is_valid_event_type("orders"));
        assert!(!is_valid_event_type("orders.created.extra"));
        assert!(!is_valid_event_type(".created"));
        assert!(!is_valid_event_type("orders."));
    }

    #[test]
    fn event_version_pattern() {
        assert!(is_valid_event_version("v1"));
        assert!(is_valid_event_version("v42"));
        assert!(!is_valid_event_version("1"));
        assert!(!is_valid_event_version("v"));
        assert!(!is_valid_event_version("va"));
        assert!(!is_valid_event_version("v1.0"));
    }

    #[test]
    fn envelope_serde_round_trip_is_identity_on_fields() {
        let envelope = EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: "orders.created".into(),
            event_version: "v1".into(),
            occurred_at: chrono::Utc::now(),
            producer: "order-service".into(),
            producer_version: Some("1.2.0".into()),
            producer_instance: None,
            correlation_id: Some(Uuid::new_v4()),
            causation_id: None,
            parent_event_id: None,
            trace_id: Some("trace-abc".into()),
            routing_key: Some("orders.created".into()),
            priority: Priority::Normal,
            payload: serde_json::json!({"order_id": "O1"}),
            metadata: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_id, envelope.event_id);
        assert_eq!(back.event_type, envelope.event_type);
        assert_eq!(back.event_version, envelope.event_version);
        assert_eq!(back.correlation_id, envelope.correlation_id);
        assert_eq!(back.payload, envelope.payload);
    }

    #[test]
    fn priority_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
    }
}
