//! Errors surfaced by a [`crate::port::ProcessedEventStore`] implementation.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("consumer_name must not be empty")]
    EmptyConsumerName,
}
