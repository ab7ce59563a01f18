//! TOML-deserializable mirror of the configuration surface.

use erp_events_core::{BindingConfig, ExchangeConfig, QueueConfig, RetryConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_port() -> u16 {
    5672
}
fn default_vhost() -> String {
    "/".to_string()
}
fn default_heartbeat() -> u16 {
    60
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_prefetch() -> u16 {
    10
}
fn default_shutdown_timeout_ms() -> u64 {
    30_000
}
fn default_ttl_seconds() -> u64 {
    7 * 24 * 3600
}
fn default_max_concurrent_checks() -> usize {
    50
}
fn default_schema_table_name() -> String {
    "processed_events".to_string()
}
fn default_correlation_id_header() -> String {
    "x-correlation-id".to_string()
}
fn default_trace_id_header() -> String {
    "x-trace-id".to_string()
}
fn default_causation_id_header() -> String {
    "x-causation-id".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionSection {
    #[serde(default)]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    #[serde(default = "default_heartbeat")]
    pub heartbeat: u16,
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    pub connection_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsumerSection {
    pub consumer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_group: Option<String>,
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default = "default_false")]
    pub no_ack: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdempotencySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_schema_table_name")]
    pub table_name: String,
    #[serde(default = "default_ttl_seconds", rename = "ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaValidatorSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub throw_on_error: bool,
    #[serde(default = "default_true")]
    pub validate_envelope: bool,
    #[serde(default = "default_true")]
    pub validate_payload: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CorrelationSection {
    #[serde(default = "default_true")]
    pub generate_trace_id: bool,
    #[serde(default = "default_correlation_id_header")]
    pub correlation_id_header: String,
    #[serde(default = "default_trace_id_header")]
    pub trace_id_header: String,
    #[serde(default = "default_causation_id_header")]
    pub causation_id_header: String,
}

impl Default for IdempotencySection {
    fn default() -> Self {
        Self {
            enabled: true,
            connection_string: String::new(),
            schema: None,
            table_name: default_schema_table_name(),
            ttl_seconds: default_ttl_seconds(),
            max_concurrent_checks: default_max_concurrent_checks(),
        }
    }
}

impl Default for SchemaValidatorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            throw_on_error: true,
            validate_envelope: true,
            validate_payload: true,
            schemas_dir: None,
        }
    }
}

impl Default for CorrelationSection {
    fn default() -> Self {
        Self {
            generate_trace_id: true,
            correlation_id_header: default_correlation_id_header(),
            trace_id_header: default_trace_id_header(),
            causation_id_header: default_causation_id_header(),
        }
    }
}

/// The full recognized configuration surface, per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RuntimeConfig {
    pub connection: ConnectionSection,
    pub consumer: ConsumerSection,
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub idempotency: IdempotencySection,
    #[serde(default)]
    pub schema_validator: SchemaValidatorSection,
    #[serde(default)]
    pub correlation: CorrelationSection,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enable_graceful_shutdown: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_false")]
    pub enable_metrics: bool,
}
