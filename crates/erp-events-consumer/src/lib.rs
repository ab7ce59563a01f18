mod acker;
mod config;
mod consumer;
mod dispatch;
mod state;
mod topology;

pub use acker::{DeliveryAck, LapinDelivery};
pub use config::{ConnectionConfig, TopologyConfig};
pub use consumer::{Consumer, SubscribeRequest};
pub use dispatch::{apply, decide, AckDecision};
pub use state::ConsumerState;
pub use topology::assert_topology;
