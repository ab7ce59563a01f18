//! Classified error taxonomy for the event consumption runtime.
//!
//! Every error raised inside the middleware pipeline or by a handler carries
//! an [`ErrorTag`] (a stable, machine-readable classification), an
//! [`ErrorSeverity`], a `retryable` flag, and arbitrary structured context.
//! Use [`ClassifiedError::new`] and its builder methods to construct one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable classification of where/why a pipeline error occurred.
///
/// Drives both retry eligibility (see `erp-events-retry`) and the
/// ack/nack/DLQ decision the consumer makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    /// Default classification for uncategorized handler failures.
    Transient,
    /// An outbound call (HTTP, RPC, …) failed.
    ExternalService,
    /// A handler or I/O operation exceeded its timeout.
    Timeout,
    /// The idempotency store or a handler's own database call failed.
    Database,
    /// The envelope or payload failed JSON-Schema validation.
    SchemaValidation,
    /// Size/content-type/structural validation failed before schema checks.
    Validation,
    /// The idempotency guard detected a previously processed event.
    DuplicateEvent,
    /// A handler explicitly declared the error non-retryable.
    Unrecoverable,
}

impl ErrorTag {
    /// The default retryable set used when `retryable_error_tags` is empty.
    pub const DEFAULT_RETRYABLE: &'static [ErrorTag] = &[
        ErrorTag::Transient,
        ErrorTag::ExternalService,
        ErrorTag::Timeout,
        ErrorTag::Database,
    ];

    /// Tags that are never retried regardless of configuration.
    pub const NEVER_RETRYABLE: &'static [ErrorTag] = &[
        ErrorTag::SchemaValidation,
        ErrorTag::DuplicateEvent,
        ErrorTag::Unrecoverable,
        ErrorTag::Validation,
    ];

    /// Stable `&'static str` representation (e.g. `"schema_validation"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::ExternalService => "external_service",
            Self::Timeout => "timeout",
            Self::Database => "database",
            Self::SchemaValidation => "schema_validation",
            Self::Validation => "validation",
            Self::DuplicateEvent => "duplicate_event",
            Self::Unrecoverable => "unrecoverable",
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity bucket for a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// A classified pipeline error.
///
/// Carries a stable [`ErrorTag`], severity, an explicit `retryable` override,
/// a human-readable message, structured context, and the original cause.
pub struct ClassifiedError {
    /// Classification tag.
    pub tag: ErrorTag,
    /// Severity bucket.
    pub severity: ErrorSeverity,
    /// Human-readable description.
    pub message: String,
    /// Diagnostic context (e.g. failing JSON paths, event_id).
    pub context: BTreeMap<String, serde_json::Value>,
    /// Underlying cause, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ClassifiedError {
    /// Create a new classified error with a default severity of `medium`.
    pub fn new(tag: ErrorTag, message: impl Into<String>) -> Self {
        Self {
            tag,
            severity: ErrorSeverity::Medium,
            message: message.into(),
            context: BTreeMap::new(),
            source: None,
        }
    }

    /// Override the severity.
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach a key-value pair to the diagnostic context. Serialization
    /// failures are silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether this error is retryable under the given explicit tag list.
    /// An empty list falls back to [`ErrorTag::DEFAULT_RETRYABLE`]. Tags in
    /// [`ErrorTag::NEVER_RETRYABLE`] are never retried regardless.
    pub fn is_retryable(&self, retryable_error_tags: &[ErrorTag]) -> bool {
        if ErrorTag::NEVER_RETRYABLE.contains(&self.tag) {
            return false;
        }
        if retryable_error_tags.is_empty() {
            ErrorTag::DEFAULT_RETRYABLE.contains(&self.tag)
        } else {
            retryable_error_tags.contains(&self.tag)
        }
    }

    /// Convenience constructor for the idempotency guard's duplicate hit.
    pub fn duplicate(event_id: impl Into<String>) -> Self {
        Self::new(ErrorTag::DuplicateEvent, "duplicate event")
            .with_severity(ErrorSeverity::Low)
            .with_context("event_id", event_id.into())
    }
}

impl fmt::Debug for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ClassifiedError");
        d.field("tag", &self.tag);
        d.field("severity", &self.severity);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.tag, self.severity, self.message)?;
        if !self.context.is_empty()
            && let Ok(ctx) = serde_json::to_string(&self.context)
        {
            write!(f, " {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Serializable snapshot of a [`ClassifiedError`] (without the opaque source),
/// suitable for storing as `error_code`/`error_message` on a processed-event
/// record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedErrorDto {
    pub tag: ErrorTag,
    pub severity: ErrorSeverity,
    pub message: String,
    pub context: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ClassifiedError> for ClassifiedErrorDto {
    fn from(err: &ClassifiedError) -> Self {
        Self {
            tag: err.tag,
            severity: err.severity,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}
