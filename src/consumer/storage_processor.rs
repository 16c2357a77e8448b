//! [`MessageProcessor`] that routes every record straight to the Storage
//! Manager (C7), no pipeline stages involved. Wired against `alerts`,
//! `processed.*`, `aggregated.metrics` and `metrics`.

use std::sync::Arc;

use async_trait::async_trait;
use rdkafka::message::OwnedMessage;
use rdkafka::Message;
use tracing::{error, warn};

use crate::storage::StorageManager;

use super::error::ConsumerError;
use super::processor::MessageProcessor;

pub struct StorageRoutingProcessor {
    storage: Arc<StorageManager>,
}

impl StorageRoutingProcessor {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl MessageProcessor for StorageRoutingProcessor {
    type Error = ConsumerError;

    async fn process(&self, message: &OwnedMessage) -> Result<(), Self::Error> {
        let payload = message
            .payload()
            .ok_or_else(|| ConsumerError::ParseError("empty message payload".to_string()))?;

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| ConsumerError::ParseError(format!("invalid JSON: {e}")))?;

        let record = value
            .as_object()
            .cloned()
            .ok_or_else(|| ConsumerError::ParseError("record is not a JSON object".to_string()))?;

        let results = self.storage.store(&record, None).await;
        let failures: Vec<&String> = results.iter().filter(|(_, ok)| !**ok).map(|(name, _)| name).collect();
        if !failures.is_empty() {
            warn!(?failures, "storage routing: one or more adapters failed, others may have succeeded");
        }

        Ok(())
    }

    async fn on_success(&self, _message: &OwnedMessage) {}

    async fn on_failure(&self, error: &Self::Error, message: &OwnedMessage) {
        error!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            %error,
            "storage routing processor: message processing failed"
        );
    }

    fn is_retryable(&self, error: &Self::Error) -> bool {
        error.is_retryable()
    }

    fn name(&self) -> &str {
        "storage_routing_processor"
    }
}
