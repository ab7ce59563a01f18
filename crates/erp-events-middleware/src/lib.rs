mod correlation;
mod deserializer;
mod idempotency_cache;
mod idempotency_guard;
mod middleware;
mod schema_validator;

pub use correlation::{CorrelationHandler, CorrelationHeaders};
pub use deserializer::{Deserializer, DeserializerConfig};
pub use idempotency_cache::IdempotencyCache;
pub use idempotency_guard::{IdempotencyGuard, IdempotencyGuardConfig};
pub use middleware::{Decision, Middleware, Pipeline};
pub use schema_validator::{SchemaValidator, SchemaValidatorConfig};
