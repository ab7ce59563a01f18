//! JSON-Schema validation for the ERP event consumption runtime: a fixed
//! envelope schema plus a registry of per-`(event_type, event_version)`
//! payload schemas with a compiled-validator cache.

pub mod envelope_schema;
pub mod error;
pub mod registry;

pub use envelope_schema::{envelope_schema, envelope_validator};
pub use error::{SchemaError, SchemaViolation};
pub use registry::{SchemaRegistry, schema_key};
