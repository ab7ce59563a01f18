//! Owns the broker connection and channel, asserts topology, subscribes to
//! queues, and runs the delivery loop — reconnecting with capped exponential
//! backoff and re-asserting topology/subscriptions on every reconnect.
//! Generalized from `other_examples`'s `lapin`-based
//! basic-consume/ack/reject consumer to the full state machine, reconnect,
//! and graceful-shutdown surface.

use crate::acker::LapinDelivery;
use crate::config::{ConnectionConfig, TopologyConfig};
use crate::dispatch;
use crate::state::ConsumerState;
use crate::topology::assert_topology;
use erp_events_core::{ProcessingContext, RetryConfig};
use erp_events_processor::Processor;
use futures::StreamExt;
use lapin::options::{BasicCancelOptions, BasicConsumeOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub queue: String,
    pub consumer_tag: Option<String>,
    pub exclusive: bool,
    pub args: Option<serde_json::Value>,
}

/// AMQP 0-9-1 consumer for a single connection/channel. Construct with
/// [`Consumer::new`], then [`Consumer::connect`] before
/// [`Consumer::subscribe`]/[`Consumer::run`].
pub struct Consumer {
    connection_config: ConnectionConfig,
    topology: TopologyConfig,
    retry_config: RetryConfig,
    processor: Arc<Processor>,
    state: Mutex<ConsumerState>,
    channel: AsyncMutex<Option<Channel>>,
    connection: AsyncMutex<Option<Connection>>,
    subscriptions: Mutex<HashMap<String, SubscribeRequest>>,
    shutting_down: AtomicBool,
}

impl Consumer {
    pub fn new(
        connection_config: ConnectionConfig,
        topology: TopologyConfig,
        retry_config: RetryConfig,
        processor: Arc<Processor>,
    ) -> Self {
        Self {
            connection_config,
            topology,
            retry_config,
            processor,
            state: Mutex::new(ConsumerState::Disconnected),
            channel: AsyncMutex::new(None),
            connection: AsyncMutex::new(None),
            subscriptions: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ConsumerState) {
        *self.state.lock().unwrap() = state;
    }

    /// Connect, open a channel, set `prefetch`, and assert topology.
    pub async fn connect(&self) -> anyhow::Result<()> {
        self.set_state(ConsumerState::Connecting);
        let uri = self.connection_config.amqp_uri();
        let properties = ConnectionProperties::default()
            .with_connection_name(self.connection_config.connection_name.clone().into());
        let connection = Connection::connect(&uri, properties).await?;

        let channel = connection.create_channel().await?;
        channel
            .basic_qos(self.connection_config.prefetch, BasicQosOptions::default())
            .await?;
        assert_topology(&channel, &self.topology).await?;

        *self.connection.lock().await = Some(connection);
        *self.channel.lock().await = Some(channel);
        self.set_state(ConsumerState::Connected);
        tracing::info!(target: "erp_events.consumer", "connected");
        Ok(())
    }

    /// Assert the queue (idempotent), register the subscription, and start
    /// consuming. Must be called after [`Consumer::connect`].
    pub async fn subscribe(&self, request: SubscribeRequest) -> anyhow::Result<lapin::Consumer> {
        let channel_guard = self.channel.lock().await;
        let channel = channel_guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("subscribe called before connect"))?;

        let consumer_tag = request
            .consumer_tag
            .clone()
            .unwrap_or_else(|| format!("erp-events-{}", uuid::Uuid::new_v4()));

        let args = request
            .args
            .as_ref()
            .and_then(|v| v.as_object())
            .map(|_| FieldTable::default())
            .unwrap_or_default();

        let consumer = channel
            .basic_consume(
                &request.queue,
                &consumer_tag,
                BasicConsumeOptions {
                    exclusive: request.exclusive,
                    no_ack: false,
                    ..Default::default()
                },
                args,
            )
            .await?;

        self.subscriptions
            .lock()
            .unwrap()
            .insert(consumer_tag, request);
        Ok(consumer)
    }

    /// Re-assert topology and re-subscribe to every previously subscribed
    /// queue after a reconnect. Consumer tags are regenerated.
    async fn resubscribe_all(&self) -> anyhow::Result<Vec<lapin::Consumer>> {
        let requests: Vec<SubscribeRequest> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .cloned()
            .collect();
        self.subscriptions.lock().unwrap().clear();

        let mut consumers = Vec::with_capacity(requests.len());
        for mut request in requests {
            request.consumer_tag = None;
            consumers.push(self.subscribe(request).await?);
        }
        Ok(consumers)
    }

    /// Reconnect with capped exponential backoff, up to
    /// `max_reconnect_attempts`, re-asserting topology and subscriptions on
    /// success.
    pub async fn reconnect(&self) -> anyhow::Result<Vec<lapin::Consumer>> {
        self.set_state(ConsumerState::Reconnecting);
        let mut attempts = 0u32;
        loop {
            if attempts >= self.connection_config.max_reconnect_attempts {
                anyhow::bail!("exceeded max_reconnect_attempts ({attempts})");
            }
            let delay_ms = self.connection_config.reconnect_delay_ms(attempts);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            match self.connect().await {
                Ok(()) => match self.resubscribe_all().await {
                    Ok(consumers) => return Ok(consumers),
                    Err(err) => {
                        tracing::warn!(target: "erp_events.consumer", error = %err, "resubscribe failed, retrying");
                    }
                },
                Err(err) => {
                    tracing::warn!(target: "erp_events.consumer", error = %err, attempt = attempts, "reconnect attempt failed");
                }
            }
            attempts += 1;
        }
    }

    /// Process a single delivery to a terminal ack/nack outcome.
    pub async fn handle_delivery(&self, delivery: lapin::message::Delivery) -> anyhow::Result<()> {
        let content_type = delivery
            .properties
            .content_type()
            .as_ref()
            .map(|s| s.to_string());
        let attempt = delivery
            .properties
            .headers()
            .as_ref()
            .and_then(|h| h.inner().get("x-delivery-count"))
            .and_then(|v| match v {
                lapin::types::AMQPValue::LongUInt(n) => Some(*n),
                lapin::types::AMQPValue::LongLongInt(n) => Some(*n as u32),
                lapin::types::AMQPValue::ShortUInt(n) => Some(*n as u32),
                _ => None,
            })
            .unwrap_or(0)
            + 1;

        let ctx = ProcessingContext::new(delivery.data.clone(), content_type, attempt);
        let result = self.processor.process(ctx).await;
        let decision = dispatch::decide(&result, attempt, &self.retry_config);
        let ack = LapinDelivery(delivery);
        dispatch::apply(decision, &ack, attempt, &self.retry_config).await?;
        Ok(())
    }

    /// Drive the delivery loop for `consumer` until it closes or shutdown is
    /// requested.
    pub async fn run(&self, mut consumer: lapin::Consumer) -> anyhow::Result<()> {
        while let Some(delivery) = consumer.next().await {
            if self.shutting_down.load(Ordering::Relaxed) {
                break;
            }
            match delivery {
                Ok(delivery) => {
                    if let Err(err) = self.handle_delivery(delivery).await {
                        tracing::error!(target: "erp_events.consumer", error = %err, "delivery handling failed");
                    }
                }
                Err(err) => {
                    tracing::error!(target: "erp_events.consumer", error = %err, "delivery stream error");
                    if self.state().should_reconnect_on_error() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Graceful shutdown: stop accepting new work, allow a short grace
    /// period for in-flight handlers, cancel consumers, close the channel
    /// and connection. Bounded by `shutdown_timeout_ms`.
    pub async fn shutdown(&self, consumer_tags: &[String]) -> anyhow::Result<()> {
        self.set_state(ConsumerState::Closing);
        self.shutting_down.store(true, Ordering::Relaxed);

        let timeout = Duration::from_millis(self.connection_config.shutdown_timeout_ms);
        let procedure = async {
            tokio::time::sleep(Duration::from_secs(1)).await;

            if let Some(channel) = self.channel.lock().await.as_ref() {
                for tag in consumer_tags {
                    let _ = channel
                        .basic_cancel(tag, BasicCancelOptions::default())
                        .await;
                }
                let _ = channel.close(200, "shutting down").await;
            }
            if let Some(connection) = self.connection.lock().await.as_ref() {
                let _ = connection.close(200, "shutting down").await;
            }
            Ok::<(), anyhow::Error>(())
        };

        let result = tokio::time::timeout(timeout, procedure).await;
        self.set_state(ConsumerState::Closed);
        match result {
            Ok(inner) => inner,
            Err(_) => anyhow::bail!("shutdown exceeded shutdown_timeout_ms"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_consumer_starts_disconnected() {
        let config = ConnectionConfig {
            hostname: "localhost".into(),
            port: 5672,
            user: "guest".into(),
            password: "guest".into(),
            vhost: "/".into(),
            heartbeat_secs: 60,
            timeout_ms: 10_000,
            connection_name: "test".into(),
            explicit_url: None,
            prefetch: 10,
            max_reconnect_attempts: 10,
            reconnect_initial_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            shutdown_timeout_ms: 30_000,
        };
        let registry = erp_events_processor::HandlerRegistry::new();
        let pipeline = erp_events_middleware::Pipeline::new();
        let processor = Arc::new(Processor::new(pipeline, registry));
        let consumer = Consumer::new(config, TopologyConfig::default(), RetryConfig::default(), processor);
        assert_eq!(consumer.state(), ConsumerState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_without_a_connection_still_completes_and_closes() {
        let config = ConnectionConfig {
            hostname: "localhost".into(),
            port: 5672,
            user: "guest".into(),
            password: "guest".into(),
            vhost: "/".into(),
            heartbeat_secs: 60,
            timeout_ms: 10_000,
            connection_name: "test".into(),
            explicit_url: None,
            prefetch: 10,
            max_reconnect_attempts: 10,
            reconnect_initial_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            shutdown_timeout_ms: 5_000,
        };
        let registry = erp_events_processor::HandlerRegistry::new();
        let pipeline = erp_events_middleware::Pipeline::new();
        let processor = Arc::new(Processor::new(pipeline, registry));
        let consumer = Consumer::new(config, TopologyConfig::default(), RetryConfig::default(), processor);

        consumer.shutdown(&[]).await.unwrap();
        assert_eq!(consumer.state(), ConsumerState::Closed);
    }
}
