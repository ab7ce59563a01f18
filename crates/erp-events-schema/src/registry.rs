//! Read-only lookup from `(event_type, event_version)` to a compiled
//! payload validator, plus the fixed envelope validator.

use crate::envelope_schema::envelope_validator;
use crate::error::{SchemaError, SchemaViolation};
use jsonschema::Validator;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Schema-key for `(event_type, event_version)`, e.g.
/// `"events/orders/created-v1"` for `("orders.created", "v1")`.
pub fn schema_key(event_type: &str, event_version: &str) -> String {
    let (domain, action) = event_type.split_once('.').unwrap_or((event_type, ""));
    format!("events/{domain}/{action}-{event_version}")
}

/// Read-only schema lookup. Compiled validators are cached per schema key so
/// repeated deliveries of the same `(event_type, event_version)` do not
/// recompile the schema. Loaders dereference `$ref` entries local to the
/// schema document (e.g. `$defs`) — `jsonschema::validator_for` resolves
/// those natively.
pub struct SchemaRegistry {
    schemas_dir: Option<PathBuf>,
    cache: Mutex<HashMap<String, Arc<Validator>>>,
}

impl SchemaRegistry {
    pub fn new(schemas_dir: Option<PathBuf>) -> Self {
        Self {
            schemas_dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// In-memory registry with no backing directory — only schemas inserted
    /// via [`Self::register_raw`] are resolvable. Intended for tests and for
    /// `erp-events-cli validate-config`'s offline path.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// The fixed, hard-coded envelope validator.
    pub fn envelope_validator(&self) -> &'static Validator {
        envelope_validator()
    }

    /// Validate an envelope instance against the fixed envelope schema,
    /// returning the list of failing JSON paths on mismatch.
    pub fn validate_envelope(&self, instance: &serde_json::Value) -> Result<(), SchemaError> {
        validate_with(self.envelope_validator(), "envelope", instance)
    }

    /// Pre-register a schema document directly, bypassing the filesystem.
    /// Used by tests and by callers that load schemas from an embedded
    /// source instead of `schemas_dir`.
    pub fn register_raw(
        &self,
        event_type: &str,
        event_version: &str,
        schema: &serde_json::Value,
    ) -> Result<(), SchemaError> {
        let key = schema_key(event_type, event_version);
        let validator = compile(&key, schema)?;
        self.cache.lock().unwrap().insert(key, Arc::new(validator));
        Ok(())
    }

    /// Resolve and (if not cached) compile the payload validator for
    /// `(event_type, event_version)`.
    pub fn payload_validator(
        &self,
        event_type: &str,
        event_version: &str,
    ) -> Result<Arc<Validator>, SchemaError> {
        let key = schema_key(event_type, event_version);
        if let Some(v) = self.cache.lock().unwrap().get(&key) {
            return Ok(Arc::clone(v));
        }

        let schema_value = self.load_schema_document(&key)?;
        let validator = Arc::new(compile(&key, &schema_value)?);
        self.cache
            .lock()
            .unwrap()
            .insert(key.clone(), Arc::clone(&validator));
        Ok(validator)
    }

    /// Validate `payload` against the registered schema for
    /// `(event_type, event_version)`.
    pub fn validate_payload(
        &self,
        event_type: &str,
        event_version: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SchemaError> {
        let key = schema_key(event_type, event_version);
        let validator = self.payload_validator(event_type, event_version)?;
        validate_with(&validator, &key, payload)
    }

    fn load_schema_document(&self, key: &str) -> Result<serde_json::Value, SchemaError> {
        let dir = self
            .schemas_dir
            .as_deref()
            .ok_or_else(|| SchemaError::NotFound { key: key.into() })?;
        let path = schema_path(dir, key);
        let content = std::fs::read_to_string(&path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SchemaError::Parse {
            key: key.into(),
            source,
        })
    }
}

fn schema_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn compile(key: &str, schema: &serde_json::Value) -> Result<Validator, SchemaError> {
    jsonschema::validator_for(schema).map_err(|e| SchemaError::Compile {
        key: key.into(),
        message: e.to_string(),
    })
}

fn validate_with(
    validator: &Validator,
    key: &str,
    instance: &serde_json::Value,
) -> Result<(), SchemaError> {
    let violations: Vec<SchemaViolation> = validator
        .iter_errors(instance)
        .map(|e| SchemaViolation {
            path: e.instance_path.to_string(),
            expected: e.to_string(),
            actual: e.instance.to_string(),
        })
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Validation {
            key: key.into(),
            violations,
        })
    }
}
