//! Time-series adapter: writes InfluxDB line protocol over its HTTP
//! `/api/v2/write` (or 1.x `/write`) endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::storage::{StorageAdapter, StorageError};

const TAG_KEYS: [&str; 9] = [
    "event_type",
    "topic",
    "source",
    "warehouse_zone",
    "location_id",
    "item_category",
    "action",
    "severity",
    "alert_type",
];

const NUMERIC_FIELD_KEYS: [&str; 12] = [
    "quantity",
    "processing_time_ms",
    "anomaly_score",
    "confidence_score",
    "value",
    "count",
    "duration_ms",
    "error_count",
    "success_rate",
    "throughput",
    "latency_p95",
    "latency_p99",
];

pub struct TimeSeriesAdapter {
    client: Client,
    write_url: String,
}

impl TimeSeriesAdapter {
    pub fn new(write_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            write_url: write_url.into(),
        }
    }

    fn to_line(&self, record: &Map<String, Value>) -> Option<String> {
        let measurement = record
            .get("measurement")
            .or_else(|| record.get("event_type"))
            .or_else(|| record.get("metric_name"))
            .and_then(Value::as_str)
            .unwrap_or("warehouse_metric");

        let mut tags = Vec::new();
        if let Some(Value::Object(declared)) = record.get("tags") {
            for (k, v) in declared {
                if let Some(s) = v.as_str() {
                    tags.push(format!("{}={}", escape_tag(k), escape_tag(s)));
                }
            }
        }
        for key in TAG_KEYS {
            if let Some(v) = record.get(key).and_then(Value::as_str) {
                tags.push(format!("{}={}", key, escape_tag(v)));
            }
        }
        tags.sort();
        tags.dedup();

        let mut fields = Vec::new();
        if let Some(Value::Object(declared)) = record.get("fields") {
            for (k, v) in declared {
                if let Some(line) = field_line(k, v) {
                    fields.push(line);
                }
            }
        }
        for key in NUMERIC_FIELD_KEYS {
            if let Some(v) = record.get(key) {
                if let Some(line) = field_line(key, v) {
                    fields.push(line);
                }
            }
        }
        if fields.is_empty() {
            fields.push("event_count=1i".to_string());
        }

        let timestamp_ns = record
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_nanos_opt().unwrap_or_default())
            .unwrap_or_else(|| chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());

        let tag_part = if tags.is_empty() {
            String::new()
        } else {
            format!(",{}", tags.join(","))
        };
        Some(format!(
            "{}{} {} {}",
            escape_measurement(measurement),
            tag_part,
            fields.join(","),
            timestamp_ns
        ))
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(' ', "\\ ").replace(',', "\\,")
}

fn escape_tag(s: &str) -> String {
    s.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

fn field_line(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(format!("{}={}i", key, n)),
        Value::Number(n) => Some(format!("{}={}", key, n.as_f64()?)),
        Value::Bool(b) => Some(format!("{}={}", key, b)),
        Value::String(s) => Some(format!("{}=\"{}\"", key, s.replace('"', "\\\""))),
        _ => None,
    }
}

#[async_trait]
impl StorageAdapter for TimeSeriesAdapter {
    fn name(&self) -> &str {
        "timeseries"
    }

    async fn connect(&self) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> bool {
        self.client
            .get(&self.write_url)
            .send()
            .await
            .map(|r| r.status().is_success() || r.status().as_u16() == 404)
            .unwrap_or(false)
    }

    async fn store(&self, record: &Map<String, Value>) -> Result<bool, StorageError> {
        self.batch_store(std::slice::from_ref(record)).await
    }

    async fn batch_store(&self, records: &[Map<String, Value>]) -> Result<bool, StorageError> {
        let body = records
            .iter()
            .filter_map(|r| self.to_line(r))
            .collect::<Vec<_>>()
            .join("\n");
        if body.is_empty() {
            return Ok(true);
        }
        let response = self
            .client
            .post(&self.write_url)
            .body(body)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_event_count_when_no_fields_present() {
        let adapter = TimeSeriesAdapter::new("http://localhost:8086/write");
        let record = json!({"event_type": "inventory"}).as_object().unwrap().clone();
        let line = adapter.to_line(&record).unwrap();
        assert!(line.contains("event_count=1i"));
        assert!(line.starts_with("inventory,event_type=inventory"));
    }

    #[test]
    fn picks_up_numeric_allow_list_fields() {
        let adapter = TimeSeriesAdapter::new("http://localhost:8086/write");
        let record = json!({"measurement": "perf", "quantity": 5, "latency_p95": 120.5})
            .as_object()
            .unwrap()
            .clone();
        let line = adapter.to_line(&record).unwrap();
        assert!(line.contains("quantity=5i"));
        assert!(line.contains("latency_p95=120.5"));
    }
}
