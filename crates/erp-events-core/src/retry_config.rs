//! [`RetryConfig`]: data consumed by the pure retry-policy functions in
//! `erp-events-retry`.

use crate::error::ErrorTag;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backoff shape. `None` disables retry entirely (`delay_for` is never
/// called, `is_retryable` is moot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicyKind {
    None,
    Fixed,
    Linear,
    Exponential,
    #[default]
    ExponentialWithJitter,
}

/// Retry tuning. Mirrors `spec.md` §3 `RetryConfig` exactly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetryConfig {
    pub policy: RetryPolicyKind,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Must be within `[0, 1]`.
    pub jitter_factor: f64,
    /// Tags eligible for retry. Empty means "use the default set" (see
    /// [`ErrorTag::DEFAULT_RETRYABLE`]).
    #[serde(default)]
    pub retryable_error_tags: Vec<ErrorTag>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicyKind::ExponentialWithJitter,
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            retryable_error_tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert!(cfg.jitter_factor >= 0.0 && cfg.jitter_factor <= 1.0);
        assert!(cfg.retryable_error_tags.is_empty());
    }
}
