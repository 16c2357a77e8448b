//! Storage Manager (C7) and Storage Adapters (C8): routes enriched
//! records, alerts and aggregated metrics to pluggable backing stores.

pub mod adapters;
pub mod error;
pub mod manager;

pub use error::StorageError;
pub use manager::{StorageManager, SystemStats};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Canonical data-type buckets the routing table keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Metrics,
    Logs,
    Alerts,
    Events,
    Aggregated,
    Performance,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Metrics => "metrics",
            DataType::Logs => "logs",
            DataType::Alerts => "alerts",
            DataType::Events => "events",
            DataType::Aggregated => "aggregated",
            DataType::Performance => "performance",
        }
    }

    /// Infers the bucket for a record lacking an explicit type, per the
    /// field-presence rules: metric fields first, then alert/severity
    /// markers (checked ahead of performance so a record carrying both
    /// resolves to `alerts`), then aggregation/performance/log markers,
    /// defaulting to plain events.
    pub fn infer(record: &Map<String, Value>) -> DataType {
        if record.contains_key("metric_name") || record.contains_key("measurement") {
            return DataType::Metrics;
        }
        let event_type = record.get("event_type").and_then(Value::as_str).unwrap_or("");
        if record.contains_key("severity") || event_type.contains("alert") {
            return DataType::Alerts;
        }
        if record
            .get("data_type")
            .and_then(Value::as_str)
            .map(|v| v.contains("aggregated"))
            .unwrap_or(false)
        {
            return DataType::Aggregated;
        }
        let source = record.get("source").and_then(Value::as_str).unwrap_or("");
        if source.contains("performance") {
            return DataType::Performance;
        }
        if record.contains_key("level") || record.contains_key("message") {
            return DataType::Logs;
        }
        DataType::Events
    }
}

/// Common contract every backing store implements. Adapters are trait
/// objects so the manager can fan records out to a heterogeneous set of
/// them without knowing their concrete wire protocol.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn connect(&self) -> Result<bool, StorageError>;
    async fn disconnect(&self);
    async fn health_check(&self) -> bool;
    async fn store(&self, record: &Map<String, Value>) -> Result<bool, StorageError>;
    async fn batch_store(&self, records: &[Map<String, Value>]) -> Result<bool, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn infers_metrics_before_anything_else() {
        let record = map(json!({"metric_name": "cpu", "severity": "high"}));
        assert_eq!(DataType::infer(&record), DataType::Metrics);
    }

    #[test]
    fn alerts_detected_before_performance() {
        let record = map(json!({"severity": "critical", "source": "performance-monitor"}));
        assert_eq!(DataType::infer(&record), DataType::Alerts);
    }

    #[test]
    fn falls_back_to_events() {
        let record = map(json!({"item_id": "I1"}));
        assert_eq!(DataType::infer(&record), DataType::Events);
    }
}
