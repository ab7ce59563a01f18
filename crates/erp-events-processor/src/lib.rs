mod processor;
mod registry;
mod stats;

pub use processor::Processor;
pub use registry::{EventHandler, HandlerRegistry};
pub use stats::{ProcessorStats, StatsSnapshot};
