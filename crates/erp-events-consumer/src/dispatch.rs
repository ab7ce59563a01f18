//! Turns a [`ProcessingResult`] into an ack/nack decision and (for the
//! retryable-and-not-exhausted case) drives the sleep-then-nack(requeue)
//! sequence. Decoupled from `lapin` so it can be exercised against a
//! [`crate::acker::DeliveryAck`] test double without a live broker.

use crate::acker::DeliveryAck;
use erp_events_core::{ErrorTag, ProcessingResult, RetryConfig};
use std::time::Duration;

fn tag_is_retryable(tag: ErrorTag, retryable_error_tags: &[ErrorTag]) -> bool {
    if ErrorTag::NEVER_RETRYABLE.contains(&tag) {
        return false;
    }
    if retryable_error_tags.is_empty() {
        ErrorTag::DEFAULT_RETRYABLE.contains(&tag)
    } else {
        retryable_error_tags.contains(&tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    NackRequeue,
    NackDrop,
}

/// Decide, without performing I/O, what the Consumer should do for a
/// completed [`ProcessingResult`]. `attempt` is the 1-based delivery attempt
/// that just ran.
pub fn decide(result: &ProcessingResult, attempt: u32, config: &RetryConfig) -> AckDecision {
    if result.success {
        return AckDecision::Ack;
    }

    let retryable = result
        .error
        .as_ref()
        .map(|e| tag_is_retryable(e.tag, &config.retryable_error_tags))
        .unwrap_or(false);

    if retryable && erp_events_retry::can_retry(attempt, config) {
        AckDecision::NackRequeue
    } else {
        AckDecision::NackDrop
    }
}

/// Apply a decided [`AckDecision`] against `ack`, sleeping first for a
/// requeue so the redelivery honors the retry policy's backoff.
pub async fn apply<A: DeliveryAck + ?Sized>(
    decision: AckDecision,
    ack: &A,
    attempt: u32,
    config: &RetryConfig,
) -> Result<(), lapin::Error> {
    match decision {
        AckDecision::Ack => ack.ack().await,
        AckDecision::NackRequeue => {
            let delay_ms = erp_events_retry::delay_for(attempt as i64, config);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            ack.nack(true).await
        }
        AckDecision::NackDrop => ack.nack(false).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acker::mock::{AckOutcome, MockAck};
    use erp_events_core::{ClassifiedErrorDto, ErrorSeverity, ErrorTag};

    fn failure(tag: ErrorTag) -> ProcessingResult {
        ProcessingResult::failure(
            5,
            0,
            ClassifiedErrorDto {
                tag,
                severity: ErrorSeverity::Medium,
                message: "boom".into(),
                context: Default::default(),
                source_message: None,
            },
        )
    }

    #[test]
    fn success_always_acks() {
        let result = ProcessingResult::success(5, 0, None);
        assert_eq!(decide(&result, 1, &RetryConfig::default()), AckDecision::Ack);
    }

    #[test]
    fn retryable_error_under_max_attempts_requeues() {
        let result = failure(ErrorTag::Transient);
        let config = RetryConfig::default();
        assert_eq!(decide(&result, 1, &config), AckDecision::NackRequeue);
    }

    #[test]
    fn retryable_error_at_max_attempts_drops() {
        let result = failure(ErrorTag::Transient);
        let config = RetryConfig {
            max_attempts: 2,
            ..Default::default()
        };
        assert_eq!(decide(&result, 2, &config), AckDecision::NackDrop);
    }

    #[test]
    fn non_retryable_error_drops_immediately() {
        let result = failure(ErrorTag::SchemaValidation);
        assert_eq!(decide(&result, 1, &RetryConfig::default()), AckDecision::NackDrop);
    }

    #[tokio::test]
    async fn apply_ack_calls_ack() {
        let mock = MockAck::default();
        apply(AckDecision::Ack, &mock, 1, &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(mock.outcome(), Some(AckOutcome::Acked));
    }

    #[tokio::test]
    async fn apply_nack_drop_calls_nack_without_requeue() {
        let mock = MockAck::default();
        apply(AckDecision::NackDrop, &mock, 1, &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(mock.outcome(), Some(AckOutcome::Nacked { requeue: false }));
    }
}
