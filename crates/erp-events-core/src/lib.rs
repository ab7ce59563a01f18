//! Core contract types for the ERP event consumption runtime: the envelope
//! wire format, per-delivery processing context, the classified error
//! taxonomy, processed-event record types, handler registration keys, retry
//! configuration, and broker topology descriptions.
//!
//! These types have no I/O of their own; they are the shared vocabulary that
//! `erp-events-retry`, `erp-events-schema`, `erp-events-store`,
//! `erp-events-middleware`, `erp-events-processor`, and `erp-events-consumer`
//! build on.

pub mod context;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod record;
pub mod retry_config;
pub mod topology;

pub use context::ProcessingContext;
pub use envelope::{EventEnvelope, Priority};
pub use error::{ClassifiedError, ClassifiedErrorDto, ErrorSeverity, ErrorTag};
pub use handler::HandlerKey;
pub use record::{
    CheckResult, OutcomeUpdate, ProcessedEventRecord, ProcessingOutcome, ProcessingResult,
    ProcessingStatus,
};
pub use retry_config::{RetryConfig, RetryPolicyKind};
pub use topology::{BindingConfig, DeadLetterConfig, ExchangeConfig, ExchangeType, QueueConfig};
