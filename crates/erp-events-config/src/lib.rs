//! Configuration loading and validation for the ERP event consumption
//! runtime. Grounded on the teacher's `abp-cli::config` (TOML-backed struct,
//! `load_config`/`validate_config` free functions, a `ConfigError` enum with
//! a `Display` impl), generalized from a single `backends` map to this
//! runtime's connection/topology/retry/idempotency/middleware surface.

mod error;
mod schema;
mod types;

pub use error::ConfigError;
pub use schema::config_json_schema;
pub use types::{
    ConnectionSection, ConsumerSection, CorrelationSection, IdempotencySection, RuntimeConfig,
    SchemaValidatorSection,
};

use std::path::Path;

/// Read and parse a TOML configuration file. Does not validate semantics —
/// call [`validate_config`] on the result.
pub fn load_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {e}", path.display()))?;
    let config: RuntimeConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file '{}': {e}", path.display()))?;
    Ok(config)
}

/// Validate a parsed [`RuntimeConfig`], returning every semantic error
/// found (not just the first).
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.connection.hostname.trim().is_empty() && config.connection.explicit_url.is_none() {
        errors.push(ConfigError::MissingRequiredField {
            field: "connection.hostname".into(),
        });
    }
    if config.consumer.consumer_name.trim().is_empty() {
        errors.push(ConfigError::MissingRequiredField {
            field: "consumer.consumer_name".into(),
        });
    }
    if config.consumer.prefetch == 0 {
        errors.push(ConfigError::InvalidValue {
            field: "consumer.prefetch".into(),
            reason: "must be >= 1".into(),
        });
    }
    if config.queues.is_empty() {
        errors.push(ConfigError::MissingRequiredField {
            field: "queues".into(),
        });
    }

    if config.retry.max_attempts == 0 {
        errors.push(ConfigError::InvalidValue {
            field: "retry.max_attempts".into(),
            reason: "must be >= 1".into(),
        });
    }
    if !(0.0..=1.0).contains(&config.retry.jitter_factor) {
        errors.push(ConfigError::InvalidValue {
            field: "retry.jitter_factor".into(),
            reason: "must be within 0..=1".into(),
        });
    }

    if config.idempotency.enabled && config.idempotency.connection_string.trim().is_empty() {
        errors.push(ConfigError::InvalidValue {
            field: "idempotency.connection_string".into(),
            reason: "required when idempotency.enabled is true".into(),
        });
    }
    if config.idempotency.ttl_seconds == 0 {
        errors.push(ConfigError::InvalidValue {
            field: "idempotency.ttl".into(),
            reason: "must be > 0".into(),
        });
    }

    if config.shutdown_timeout_ms == 0 {
        errors.push(ConfigError::InvalidValue {
            field: "shutdown_timeout_ms".into(),
            reason: "must be > 0".into(),
        });
    }

    for binding in &config.bindings {
        if !config.queues.iter().any(|q| q.name == binding.queue) {
            errors.push(ConfigError::InvalidValue {
                field: "bindings".into(),
                reason: format!("binding references unknown queue '{}'", binding.queue),
            });
        }
        if !config.exchanges.iter().any(|e| e.name == binding.exchange) {
            errors.push(ConfigError::InvalidValue {
                field: "bindings".into(),
                reason: format!("binding references unknown exchange '{}'", binding.exchange),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
