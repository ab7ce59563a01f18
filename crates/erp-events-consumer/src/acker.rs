//! Abstracts the ack/nack side of a delivery behind a trait so the delivery
//! decision logic in [`crate::dispatch`] can be exercised without a live
//! broker — mirroring the teacher's pattern of standing a trait-object test
//! double in for a real I/O backend (`abp-backend-mock`'s `MockBackend`
//! implementing the same `Backend` trait production code uses).

use async_trait::async_trait;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};

#[async_trait]
pub trait DeliveryAck: Send + Sync {
    async fn ack(&self) -> Result<(), lapin::Error>;
    async fn nack(&self, requeue: bool) -> Result<(), lapin::Error>;
}

/// Wraps an owned [`Delivery`] so the trait methods below don't collide with
/// `Delivery`'s own inherent `ack`/`nack` (which take explicit options).
pub struct LapinDelivery(pub Delivery);

#[async_trait]
impl DeliveryAck for LapinDelivery {
    async fn ack(&self) -> Result<(), lapin::Error> {
        self.0.ack(BasicAckOptions::default()).await
    }

    async fn nack(&self, requeue: bool) -> Result<(), lapin::Error> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                multiple: false,
            })
            .await
    }
}
