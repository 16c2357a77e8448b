//! Search index adapter: writes documents to Elasticsearch/OpenSearch via
//! the `_bulk` HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::storage::{StorageAdapter, StorageError};

/// Fields coerced to a string ("keyword") mapping regardless of their
/// JSON type, so term-level queries behave predictably.
const KEYWORD_FIELDS: [&str; 5] = ["item_id", "location_id", "event_type", "action", "alert_type"];
/// Fields coerced to numeric, dropped if they don't parse.
const NUMERIC_FIELDS: [&str; 4] = ["quantity", "confidence", "anomaly_score", "processing_time_ms"];

pub struct SearchAdapter {
    client: Client,
    base_url: String,
}

impl SearchAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn index_for(&self, record: &Map<String, Value>) -> &'static str {
        let event_type = record.get("event_type").and_then(Value::as_str).unwrap_or("");
        if event_type.contains("alert") {
            "alerts"
        } else if event_type.contains("audit") {
            "audit"
        } else {
            "logs"
        }
    }

    fn prepare_document(&self, record: &Map<String, Value>) -> Map<String, Value> {
        let mut doc = Map::new();
        for (key, value) in record {
            match value {
                Value::Null => continue,
                Value::String(s) if s.is_empty() => continue,
                _ => {}
            }
            if KEYWORD_FIELDS.contains(&key.as_str()) {
                doc.insert(key.clone(), Value::from(to_keyword(value)));
                continue;
            }
            if NUMERIC_FIELDS.contains(&key.as_str()) {
                if let Some(n) = to_numeric(value) {
                    doc.insert(key.clone(), json!(n));
                }
                continue;
            }
            doc.insert(key.clone(), value.clone());
        }
        let timestamp = record
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        doc.insert("@timestamp".to_string(), Value::from(timestamp));
        doc
    }
}

fn to_keyword(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl StorageAdapter for SearchAdapter {
    fn name(&self) -> &str {
        "search"
    }

    async fn connect(&self) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/_cluster/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn store(&self, record: &Map<String, Value>) -> Result<bool, StorageError> {
        self.batch_store(std::slice::from_ref(record)).await
    }

    async fn batch_store(&self, records: &[Map<String, Value>]) -> Result<bool, StorageError> {
        if records.is_empty() {
            return Ok(true);
        }
        let mut body = String::new();
        for record in records {
            let index = self.index_for(record);
            let document = self.prepare_document(record);
            body.push_str(&json!({"index": {"_index": index}}).to_string());
            body.push('\n');
            body.push_str(&Value::Object(document).to_string());
            body.push('\n');
        }

        let response = self
            .client
            .post(format!("{}/_bulk", self.base_url))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if let Some(items) = payload.get("items").and_then(Value::as_array) {
            for item in items {
                if let Some(error) = item
                    .get("index")
                    .and_then(|v| v.get("error"))
                {
                    warn!(error = %error, "search adapter: per-document bulk index error");
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn strips_empty_and_null_fields() {
        let adapter = SearchAdapter::new("http://localhost:9200");
        let record = map(json!({"item_id": "I1", "notes": "", "user": null, "timestamp": "2024-03-11T10:00:00Z"}));
        let doc = adapter.prepare_document(&record);
        assert!(!doc.contains_key("notes"));
        assert!(!doc.contains_key("user"));
        assert!(doc.contains_key("@timestamp"));
    }

    #[test]
    fn routes_alert_event_types_to_alerts_index() {
        let adapter = SearchAdapter::new("http://localhost:9200");
        let record = map(json!({"event_type": "inventory_alert"}));
        assert_eq!(adapter.index_for(&record), "alerts");
    }
}
