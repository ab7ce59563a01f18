mod error;
mod memory;
mod port;
mod postgres;

pub use error::StoreError;
pub use memory::InMemoryProcessedEventStore;
pub use port::ProcessedEventStore;
pub use postgres::PostgresProcessedEventStore;
