//! Asserts the configured exchange/queue/binding topology against a channel.
//! Translates `dead_letter.{exchange,routing_key,message_ttl}` and
//! `message_ttl`/`max_length` into the broker's `x-*` queue arguments.

use crate::config::TopologyConfig;
use erp_events_core::{BindingConfig, ExchangeConfig, QueueConfig};
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, LongString};
use lapin::{Channel, ExchangeKind};

fn exchange_kind(config: &ExchangeConfig) -> ExchangeKind {
    match config.kind {
        erp_events_core::ExchangeType::Direct => ExchangeKind::Direct,
        erp_events_core::ExchangeType::Fanout => ExchangeKind::Fanout,
        erp_events_core::ExchangeType::Topic => ExchangeKind::Topic,
        erp_events_core::ExchangeType::Headers => ExchangeKind::Headers,
    }
}

async fn assert_exchange(channel: &Channel, config: &ExchangeConfig) -> Result<(), lapin::Error> {
    channel
        .exchange_declare(
            &config.name,
            exchange_kind(config),
            ExchangeDeclareOptions {
                durable: config.durable,
                auto_delete: config.auto_delete,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
}

fn queue_arguments(config: &QueueConfig) -> FieldTable {
    let mut args = FieldTable::default();
    if let Some(dlx) = &config.dead_letter {
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(LongString::from(dlx.exchange.clone())),
        );
        if let Some(routing_key) = &dlx.routing_key {
            args.insert(
                "x-dead-letter-routing-key".into(),
                AMQPValue::LongString(LongString::from(routing_key.clone())),
            );
        }
        if let Some(ttl) = dlx.message_ttl {
            args.insert("x-message-ttl".into(), AMQPValue::LongLongInt(ttl as i64));
        }
    }
    if let Some(ttl) = config.message_ttl {
        args.insert("x-message-ttl".into(), AMQPValue::LongLongInt(ttl as i64));
    }
    if let Some(max_length) = config.max_length {
        args.insert(
            "x-max-length".into(),
            AMQPValue::LongLongInt(max_length as i64),
        );
    }
    args
}

async fn assert_queue(channel: &Channel, config: &QueueConfig) -> Result<(), lapin::Error> {
    channel
        .queue_declare(
            &config.name,
            QueueDeclareOptions {
                durable: config.durable,
                exclusive: config.exclusive,
                auto_delete: config.auto_delete,
                ..Default::default()
            },
            queue_arguments(config),
        )
        .await?;
    Ok(())
}

async fn assert_binding(channel: &Channel, binding: &BindingConfig) -> Result<(), lapin::Error> {
    let args = binding
        .args
        .as_ref()
        .and_then(json_to_field_table)
        .unwrap_or_default();
    channel
        .queue_bind(
            &binding.queue,
            &binding.exchange,
            &binding.routing_key,
            QueueBindOptions::default(),
            args,
        )
        .await
}

fn json_to_field_table(value: &serde_json::Value) -> Option<FieldTable> {
    let object = value.as_object()?;
    let mut table = FieldTable::default();
    for (key, v) in object {
        if let Some(s) = v.as_str() {
            table.insert(key.as_str().into(), AMQPValue::LongString(LongString::from(s.to_string())));
        } else if let Some(n) = v.as_i64() {
            table.insert(key.as_str().into(), AMQPValue::LongLongInt(n));
        } else if let Some(b) = v.as_bool() {
            table.insert(key.as_str().into(), AMQPValue::Boolean(b));
        }
    }
    Some(table)
}

/// Assert every exchange, queue, and binding in `topology` against `channel`,
/// in that order (exchanges and queues before the bindings referencing them).
pub async fn assert_topology(channel: &Channel, topology: &TopologyConfig) -> Result<(), lapin::Error> {
    for exchange in &topology.exchanges {
        assert_exchange(channel, exchange).await?;
    }
    for queue in &topology.queues {
        assert_queue(channel, queue).await?;
    }
    for binding in &topology.bindings {
        assert_binding(channel, binding).await?;
    }
    Ok(())
}
