//! Broker connection parameters and topology configuration.

use erp_events_core::{BindingConfig, ExchangeConfig, QueueConfig};
use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    5672
}
fn default_vhost() -> String {
    "/".to_string()
}
fn default_heartbeat_secs() -> u16 {
    60
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_prefetch() -> u16 {
    10
}
fn default_max_reconnect_attempts() -> u32 {
    10
}
fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}
fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}
fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

/// Broker connection parameters. Either set every field below, or use
/// [`ConnectionConfig::from_url`] to bypass them with an explicit AMQP URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u16,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub connection_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_url: Option<String>,
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl ConnectionConfig {
    /// Build the `amqp://` URI lapin connects with, URL-encoding `vhost` and
    /// `password`.
    pub fn amqp_uri(&self) -> String {
        if let Some(url) = &self.explicit_url {
            return url.clone();
        }
        format!(
            "amqp://{user}:{password}@{host}:{port}/{vhost}?heartbeat={heartbeat}",
            user = urlencode(&self.user),
            password = urlencode(&self.password),
            host = self.hostname,
            port = self.port,
            vhost = urlencode(&self.vhost),
            heartbeat = self.heartbeat_secs,
        )
    }

    /// `delay = min(initial * 2^attempts, max)`, per the spec's capped
    /// exponential reconnect backoff (distinct from the retry crate's
    /// per-message policy — this one backs off reconnect attempts, not
    /// message redelivery).
    pub fn reconnect_delay_ms(&self, attempts: u32) -> u64 {
        let scaled = self
            .reconnect_initial_delay_ms
            .saturating_mul(1u64 << attempts.min(32));
        scaled.min(self.reconnect_max_delay_ms)
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// The full broker topology asserted on connect and after every reconnect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            hostname: "broker.internal".into(),
            port: 5672,
            user: "svc".into(),
            password: "p@ss/word".into(),
            vhost: "prod/erp".into(),
            heartbeat_secs: 60,
            timeout_ms: 10_000,
            connection_name: "erp-events-consumer".into(),
            explicit_url: None,
            prefetch: 10,
            max_reconnect_attempts: 10,
            reconnect_initial_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            shutdown_timeout_ms: 30_000,
        }
    }

    #[test]
    fn amqp_uri_url_encodes_password_and_vhost() {
        let uri = config().amqp_uri();
        assert!(uri.contains("p%40ss%2Fword"));
        assert!(uri.contains("prod%2Ferp"));
    }

    #[test]
    fn explicit_url_bypasses_field_assembly() {
        let mut c = config();
        c.explicit_url = Some("amqp://override/".into());
        assert_eq!(c.amqp_uri(), "amqp://override/");
    }

    #[test]
    fn reconnect_delay_is_capped_exponential() {
        let c = config();
        assert_eq!(c.reconnect_delay_ms(0), 1_000);
        assert_eq!(c.reconnect_delay_ms(1), 2_000);
        assert_eq!(c.reconnect_delay_ms(2), 4_000);
        assert_eq!(c.reconnect_delay_ms(10), 30_000);
    }
}
