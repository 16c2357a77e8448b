//! Prometheus metrics exported at `/metrics` (§6), separate from the
//! per-consumer bookkeeping in [`crate::consumer::metrics`] which backs
//! backpressure/retry decisions rather than external exposition.

#![cfg(feature = "metrics")]

use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

pub struct PipelineMetrics {
    pub registry: Registry,
    pub messages_processed_total: IntCounterVec,
    pub message_processing_seconds: HistogramVec,
    pub active_consumers: IntGaugeVec,
    pub anomalies_detected_total: IntCounterVec,
    pub redis_operations_total: IntCounterVec,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_processed_total = IntCounterVec::new(
            Opts::new("messages_processed_total", "Messages processed per topic"),
            &["topic", "status"],
        )
        .expect("valid counter opts");
        let message_processing_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "message_processing_seconds",
                "Message processing latency per topic",
            ),
            &["topic"],
        )
        .expect("valid histogram opts");
        let active_consumers = IntGaugeVec::new(
            Opts::new("active_consumers", "Currently running consumer workers"),
            &["consumer_type"],
        )
        .expect("valid gauge opts");
        let anomalies_detected_total = IntCounterVec::new(
            Opts::new("anomalies_detected_total", "Anomalies flagged by the detector"),
            &["anomaly_type"],
        )
        .expect("valid counter opts");
        let redis_operations_total = IntCounterVec::new(
            Opts::new("redis_operations_total", "Shared cache operations"),
            &["operation", "status"],
        )
        .expect("valid counter opts");

        registry
            .register(Box::new(messages_processed_total.clone()))
            .expect("register messages_processed_total");
        registry
            .register(Box::new(message_processing_seconds.clone()))
            .expect("register message_processing_seconds");
        registry
            .register(Box::new(active_consumers.clone()))
            .expect("register active_consumers");
        registry
            .register(Box::new(anomalies_detected_total.clone()))
            .expect("register anomalies_detected_total");
        registry
            .register(Box::new(redis_operations_total.clone()))
            .expect("register redis_operations_total");

        Self {
            registry,
            messages_processed_total,
            message_processing_seconds,
            active_consumers,
            anomalies_detected_total,
            redis_operations_total,
        }
    }

    pub fn record_processed(&self, topic: &str, status: &str, elapsed_seconds: f64) {
        self.messages_processed_total.with_label_values(&[topic, status]).inc();
        self.message_processing_seconds.with_label_values(&[topic]).observe(elapsed_seconds);
    }

    pub fn record_anomaly(&self, anomaly_type: &str) {
        self.anomalies_detected_total.with_label_values(&[anomaly_type]).inc();
    }

    pub fn record_redis_op(&self, operation: &str, status: &str) {
        self.redis_operations_total.with_label_values(&[operation, status]).inc();
    }

    pub fn set_active_consumers(&self, consumer_type: &str, count: i64) {
        self.active_consumers.with_label_values(&[consumer_type]).set(count);
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_processed_messages_by_topic_and_status() {
        let metrics = PipelineMetrics::new();
        metrics.record_processed("warehouse.inventory", "ok", 0.01);
        let families = metrics.registry.gather();
        assert!(families.iter().any(|f| f.get_name() == "messages_processed_total"));
    }
}
