//! [`MessageProcessor`] implementation composing the Event Processor
//! (C2), Enricher (C3), Anomaly Detector (C4) and Window Aggregator (C5)
//! over a single input topic.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::message::OwnedMessage;
use rdkafka::Message;
use tracing::{error, warn};

use crate::bus::{BusClient, Topics};
use crate::detection::AnomalyDetector;
use crate::domain::{AlertSeverity, KafkaMetadata, ProcessedEvent, RawEvent};
use crate::enrichment::Enricher;
use crate::aggregation::WindowAggregator;

use super::error::ConsumerError;
use super::processor::MessageProcessor;

/// Shared, process-wide pipeline stages a [`PipelineProcessor`] is wired
/// against; one `PipelineProcessor` exists per input topic but all of
/// them share these `Arc`s (per §5's "process-wide, read-mostly" caches
/// and the single `AppContext` shape).
pub struct PipelineStages {
    pub enricher: Arc<Enricher>,
    pub detector: Mutex<AnomalyDetector>,
    pub aggregator: Mutex<WindowAggregator>,
}

pub struct PipelineProcessor {
    stages: Arc<PipelineStages>,
    bus: Arc<BusClient>,
    producer: rdkafka::producer::FutureProducer,
    processed_topic: String,
    input_topic: String,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<crate::metrics::PipelineMetrics>>,
}

impl PipelineProcessor {
    pub fn new(
        stages: Arc<PipelineStages>,
        bus: Arc<BusClient>,
        producer: rdkafka::producer::FutureProducer,
        input_topic: &str,
    ) -> Self {
        let processed_topic = Topics::processed_topic_for(input_topic)
            .unwrap_or(Topics::PROCESSED_INVENTORY)
            .to_string();
        Self {
            stages,
            bus,
            producer,
            processed_topic,
            input_topic: input_topic.to_string(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Arc<crate::metrics::PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl MessageProcessor for PipelineProcessor {
    type Error = ConsumerError;

    async fn process(&self, message: &OwnedMessage) -> Result<(), Self::Error> {
        let start = std::time::Instant::now();
        let result = self.process_inner(message).await;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            let status = if result.is_ok() { "ok" } else { "error" };
            metrics.record_processed(message.topic(), status, start.elapsed().as_secs_f64());
        }

        result
    }

    async fn on_success(&self, _message: &OwnedMessage) {}

    async fn on_failure(&self, error: &Self::Error, message: &OwnedMessage) {
        error!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            %error,
            "pipeline processor: message processing failed"
        );
    }

    fn is_retryable(&self, error: &Self::Error) -> bool {
        error.is_retryable()
    }

    fn name(&self) -> &str {
        "pipeline_processor"
    }
}

impl PipelineProcessor {
    async fn process_inner(&self, message: &OwnedMessage) -> Result<(), ConsumerError> {
        let payload = message
            .payload()
            .ok_or_else(|| ConsumerError::ParseError("empty message payload".to_string()))?;

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| ConsumerError::ParseError(format!("invalid JSON: {e}")))?;

        let raw = RawEvent::from_json(value)
            .map_err(|e| ConsumerError::ParseError(format!("invalid event: {e}")))?;

        // Only the inventory payload schema (§6) is authoritative for this
        // pipeline; an explicit non-inventory `event_type` skips the
        // inventory-specific invariant check rather than being rejected by it.
        if raw.event_type().is_none() || raw.event_type() == Some("inventory") {
            if let Err(e) = raw.validate_inventory() {
                warn!(
                    correlation_id = raw.correlation_id().unwrap_or(""),
                    error = %e,
                    "dropping invalid inventory event"
                );
                return Err(ConsumerError::ParseError(format!("validation failed: {e}")));
            }
        }

        let kafka_metadata = KafkaMetadata {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| String::from_utf8_lossy(k).to_string()),
        };

        let processed = ProcessedEvent::from_raw(raw, kafka_metadata);
        let enriched = Arc::new(self.stages.enricher.enrich(processed));

        let anomaly = self.stages.detector.lock().detect(enriched.clone());

        self.stages
            .aggregator
            .lock()
            .record(enriched.clone(), anomaly.is_anomaly);

        self.bus
            .send(
                &self.producer,
                &self.processed_topic,
                enriched.item_id(),
                &*enriched,
                std::time::Duration::from_secs(10),
            )
            .await
            .map_err(|e| ConsumerError::ProcessingError(format!("produce enriched record: {e}")))?;

        if anomaly.is_anomaly {
            let alert_payload = serde_json::json!({
                "type": "inventory_anomaly",
                "item_id": enriched.item_id(),
                "anomaly_type": anomaly.anomaly_type,
                "confidence": anomaly.confidence,
                "details": anomaly.details,
                "timestamp": enriched.processed().timestamp_parsed,
                "severity": severity_for(anomaly.severity),
            });
            self.bus
                .send(
                    &self.producer,
                    Topics::ALERTS,
                    enriched.item_id(),
                    &alert_payload,
                    std::time::Duration::from_secs(10),
                )
                .await
                .map_err(|e| ConsumerError::ProcessingError(format!("produce alert: {e}")))?;

            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_anomaly(&anomaly.anomaly_type);
            }
        }

        Ok(())
    }
}

/// Periodically snapshots every named window plus the 5-minute quality/
/// value metrics and republishes them to `aggregated.metrics`, mirroring
/// the base crate's `spawn_metrics_reporter` periodic-interval task shape
/// rather than emitting a snapshot per event (§4.5).
pub fn spawn_aggregate_reporter(
    stages: Arc<PipelineStages>,
    bus: Arc<BusClient>,
    producer: rdkafka::producer::FutureProducer,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let (windows, five_minute) = {
                let aggregator = stages.aggregator.lock();
                let windows: Vec<_> = crate::aggregation::WindowName::ALL
                    .iter()
                    .map(|name| aggregator.snapshot(*name))
                    .collect();
                (windows, aggregator.five_minute_metrics())
            };

            let payload = serde_json::json!({
                "windows": windows,
                "five_minute": five_minute,
            });

            if let Err(e) = bus
                .send(
                    &producer,
                    Topics::AGGREGATED_METRICS,
                    None,
                    &payload,
                    std::time::Duration::from_secs(10),
                )
                .await
            {
                warn!(error = %e, "failed to publish aggregate snapshot");
            }
        }
    })
}

fn severity_for(severity: crate::domain::anomaly::Severity) -> &'static str {
    use crate::domain::anomaly::Severity::*;
    match severity {
        High => AlertSeverity::Error.as_str(),
        Medium => AlertSeverity::Warning.as_str(),
        Low => AlertSeverity::Info.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_anomaly_severity_to_alert_severity() {
        assert_eq!(severity_for(crate::domain::anomaly::Severity::High), "error");
        assert_eq!(severity_for(crate::domain::anomaly::Severity::Low), "info");
    }
}
