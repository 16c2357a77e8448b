//! Warehouse (columnar) adapter: batches rows into ClickHouse over its
//! HTTP interface.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::storage::{DataType, StorageAdapter, StorageError};

const TABLE_RAW_EVENTS: &str = "raw_events";
const TABLE_INVENTORY_METRICS: &str = "inventory_metrics";
const TABLE_ALERT_EVENTS: &str = "alert_events";
const TABLE_PERFORMANCE_METRICS: &str = "performance_metrics";

pub struct WarehouseAdapter {
    client: Client,
    base_url: String,
}

impl WarehouseAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn table_for(&self, record: &Map<String, Value>) -> &'static str {
        match DataType::infer(record) {
            DataType::Alerts => TABLE_ALERT_EVENTS,
            DataType::Performance => TABLE_PERFORMANCE_METRICS,
            DataType::Metrics | DataType::Aggregated => {
                TABLE_INVENTORY_METRICS
            }
            DataType::Events | DataType::Logs => TABLE_RAW_EVENTS,
        }
    }

    fn row_values(&self, record: &Map<String, Value>) -> String {
        let timestamp = record
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now)
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();
        let payload = escape_sql_string(&Value::Object(record.clone()).to_string());
        format!("('{}', '{}')", timestamp, payload)
    }

    async fn insert_batch(&self, table: &str, rows: &[String]) -> Result<bool, StorageError> {
        if rows.is_empty() {
            return Ok(true);
        }
        let query = format!(
            "INSERT INTO {} (timestamp, payload) VALUES {}",
            table,
            rows.join(",")
        );
        let response = self
            .client
            .post(&self.base_url)
            .body(query)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "\\'")
}

#[async_trait]
impl StorageAdapter for WarehouseAdapter {
    fn name(&self) -> &str {
        "warehouse"
    }

    async fn connect(&self) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn store(&self, record: &Map<String, Value>) -> Result<bool, StorageError> {
        self.batch_store(std::slice::from_ref(record)).await
    }

    async fn batch_store(&self, records: &[Map<String, Value>]) -> Result<bool, StorageError> {
        let mut by_table: std::collections::HashMap<&'static str, Vec<String>> =
            std::collections::HashMap::new();
        for record in records {
            let table = self.table_for(record);
            by_table.entry(table).or_default().push(self.row_values(record));
        }
        for (table, rows) in &by_table {
            if !self.insert_batch(table, rows).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alerts_route_to_alert_events_table() {
        let adapter = WarehouseAdapter::new("http://localhost:8123");
        let record = json!({"severity": "critical"}).as_object().unwrap().clone();
        assert_eq!(adapter.table_for(&record), TABLE_ALERT_EVENTS);
    }

    #[test]
    fn escapes_single_quotes_in_payload() {
        let adapter = WarehouseAdapter::new("http://localhost:8123");
        let record = json!({"notes": "O'Brien"}).as_object().unwrap().clone();
        let row = adapter.row_values(&record);
        assert!(row.contains("O\\'Brien"));
    }
}
