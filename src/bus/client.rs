//! Producer/consumer handles over the message bus.

use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Kafka client properties the pipeline is willing to forward from
/// operator-supplied configuration, mirroring the consumer module's
/// allow-list so that arbitrary `librdkafka` properties can't be injected
/// through configuration.
const ALLOWED_KAFKA_PROPS: &[&str] = &[
    "compression.type",
    "compression.level",
    "fetch.min.bytes",
    "fetch.max.wait.ms",
    "request.timeout.ms",
    "message.timeout.ms",
    "enable.idempotence",
    "message.max.bytes",
    "reconnect.backoff.ms",
    "reconnect.backoff.max.ms",
    "socket.keepalive.enable",
    "statistics.interval.ms",
];

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to create consumer: {0}")]
    ConsumerCreation(String),
    #[error("failed to subscribe to topics: {0}")]
    Subscription(String),
    #[error("failed to create producer: {0}")]
    ProducerCreation(String),
    #[error("disallowed kafka property `{0}`")]
    DisallowedProperty(String),
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("send failed: {0}")]
    Send(String),
    #[error("commit failed: {0}")]
    Commit(String),
}

/// Typed wrapper over the bus: builds consumers/producers from an allow-
/// listed property set, JSON-encodes every produced payload, and commits
/// offsets only when explicitly asked to.
pub struct BusClient {
    brokers: String,
    properties: Vec<(String, String)>,
}

impl BusClient {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, BusError> {
        let key = key.into();
        if !ALLOWED_KAFKA_PROPS.contains(&key.as_str()) {
            return Err(BusError::DisallowedProperty(key));
        }
        self.properties.push((key, value.into()));
        Ok(self)
    }

    /// Creates a polling handle bound to `group` for `topics`, with manual
    /// offset commit (`enable.auto.commit=false`) so the caller controls
    /// exactly when offsets advance.
    pub fn consumer(&self, group: &str, topics: &[&str]) -> Result<StreamConsumer, BusError> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest");
        for (key, value) in &self.properties {
            config.set(key, value);
        }

        let consumer: StreamConsumer = config
            .create()
            .map_err(|e| BusError::ConsumerCreation(e.to_string()))?;
        consumer
            .subscribe(topics)
            .map_err(|e| BusError::Subscription(e.to_string()))?;
        info!(group, ?topics, "subscribed consumer");
        Ok(consumer)
    }

    /// Creates a producer with `acks=all` and bounded retries.
    pub fn producer(&self) -> Result<FutureProducer, BusError> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("acks", "all")
            .set("retries", "3")
            .set("retry.backoff.ms", "100")
            .set("message.timeout.ms", "10000");
        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
            .create()
            .map_err(|e| BusError::ProducerCreation(e.to_string()))
    }

    /// JSON-encodes `value` and sends it to `topic` keyed by `key`, waiting
    /// up to `timeout` for delivery confirmation.
    pub async fn send<T: Serialize>(
        &self,
        producer: &FutureProducer,
        topic: &str,
        key: Option<&str>,
        value: &T,
        timeout: Duration,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_vec(value)?;
        let mut record = FutureRecord::to(topic).payload(&payload);
        if let Some(k) = key {
            record = record.key(k);
        }
        producer
            .send(record, timeout)
            .await
            .map_err(|(err, _)| BusError::Send(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_disallowed_properties() {
        let result = BusClient::new("localhost:9092").with_property("security.protocol", "PLAINTEXT");
        assert!(matches!(result, Err(BusError::DisallowedProperty(_))));
    }

    #[test]
    fn accepts_allow_listed_properties() {
        let result = BusClient::new("localhost:9092").with_property("compression.type", "lz4");
        assert!(result.is_ok());
    }
}
