//! Handler registration keys. The actual dispatch table lives in
//! `erp-events-processor`, which is the only crate that needs to hold boxed
//! handler closures; this type only describes the registration key shape so
//! that config/docs tooling can reason about it without depending on the
//! processor's handler trait objects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `(event_type, event_version?, consumer_name)` identifying a registered
/// handler. A versioned registration takes precedence over the unversioned
/// fallback for the same `event_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct HandlerKey {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_version: Option<String>,
    pub consumer_name: String,
}

impl HandlerKey {
    pub fn new(
        event_type: impl Into<String>,
        event_version: Option<String>,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            event_version,
            consumer_name: consumer_name.into(),
        }
    }

    /// Versioned registrations sort before the unversioned fallback.
    pub fn is_fallback(&self) -> bool {
        self.event_version.is_none()
    }
}
