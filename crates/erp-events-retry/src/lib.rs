//! Pure retry-policy functions: `(attempt, error-class, policy-config) →
//! (retry?, delay)`.
//!
//! Every function here is deterministic given its inputs except
//! [`delay_for`], which samples jitter from the thread-local RNG; use
//! [`delay_for_with_rng`] in tests for a reproducible result.

use erp_events_core::{ClassifiedError, RetryConfig, RetryPolicyKind};
use rand::Rng;

/// `attempt ≤ max_attempts`.
pub fn can_retry(attempt: u32, config: &RetryConfig) -> bool {
    attempt <= config.max_attempts
}

/// Whether `err` is eligible for retry under `config`'s tag list (or the
/// default set when that list is empty). Tags in
/// [`erp_events_core::ErrorTag::NEVER_RETRYABLE`] are always excluded.
pub fn is_retryable(err: &ClassifiedError, config: &RetryConfig) -> bool {
    if matches!(config.policy, RetryPolicyKind::None) {
        return false;
    }
    err.is_retryable(&config.retryable_error_tags)
}

/// Delay in milliseconds preceding the next try after `attempt` failures.
/// `attempt` is 1-based. Uses the thread-local RNG for the jitter policy.
pub fn delay_for(attempt: i64, config: &RetryConfig) -> u64 {
    delay_for_with_rng(attempt, config, &mut rand::thread_rng())
}

/// Same as [`delay_for`] but with an injectable RNG, for deterministic tests.
pub fn delay_for_with_rng(attempt: i64, config: &RetryConfig, rng: &mut impl Rng) -> u64 {
    let attempt = if attempt <= 0 { 1 } else { attempt };
    let base = base_delay_ms(attempt, config);
    let delayed = match config.policy {
        RetryPolicyKind::None => 0,
        RetryPolicyKind::ExponentialWithJitter => apply_jitter(base, config.jitter_factor, rng),
        _ => base,
    };
    delayed.min(config.max_delay_ms)
}

fn base_delay_ms(attempt: i64, config: &RetryConfig) -> u64 {
    let attempt = attempt.max(1);
    match config.policy {
        RetryPolicyKind::None => 0,
        RetryPolicyKind::Fixed => config.initial_delay_ms,
        RetryPolicyKind::Linear => {
            let steps = (attempt - 1) as f64;
            let increment = config.initial_delay_ms as f64 / 2.0;
            (config.initial_delay_ms as f64 + steps * increment).round() as u64
        }
        RetryPolicyKind::Exponential | RetryPolicyKind::ExponentialWithJitter => {
            let factor = config.backoff_multiplier.powi((attempt - 1) as i32);
            (config.initial_delay_ms as f64 * factor).round() as u64
        }
    }
}

fn apply_jitter(base: u64, jitter_factor: f64, rng: &mut impl Rng) -> u64 {
    if jitter_factor <= 0.0 {
        return base;
    }
    let spread = base as f64 * jitter_factor;
    let offset = rng.gen_range(-spread..=spread);
    let jittered = base as f64 + offset;
    jittered.max(0.0).round() as u64
}
