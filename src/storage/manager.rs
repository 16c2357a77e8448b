//! Storage Manager (C7): routes records to the adapters registered for
//! their data type and fans writes out in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::storage::{DataType, StorageAdapter};

#[derive(Debug, Clone, Default)]
pub struct SystemStats {
    pub adapter_health: HashMap<String, bool>,
    pub routing_table: HashMap<String, Vec<String>>,
}

/// Registered adapters keyed by the data-type buckets routed to them.
/// Built with the defaults from §4.7; callers may reconfigure routes by
/// constructing with a different table.
pub struct StorageManager {
    adapters: HashMap<String, Arc<dyn StorageAdapter>>,
    routes: HashMap<DataType, Vec<String>>,
}

impl StorageManager {
    pub fn new(adapters: HashMap<String, Arc<dyn StorageAdapter>>) -> Self {
        let mut routes = HashMap::new();
        routes.insert(DataType::Metrics, vec!["timeseries".to_string()]);
        routes.insert(DataType::Logs, vec!["search".to_string()]);
        routes.insert(
            DataType::Alerts,
            vec!["search".to_string(), "warehouse".to_string()],
        );
        routes.insert(DataType::Events, vec!["warehouse".to_string()]);
        routes.insert(DataType::Aggregated, vec!["warehouse".to_string()]);
        routes.insert(
            DataType::Performance,
            vec!["timeseries".to_string(), "warehouse".to_string()],
        );
        Self { adapters, routes }
    }

    fn routes_for(&self, data_type: DataType) -> &[String] {
        self.routes
            .get(&data_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn unknown_route(&self) -> Vec<String> {
        vec!["warehouse".to_string()]
    }

    /// Stores a single record, inferring its data type unless `data_type`
    /// is given. Returns per-adapter success; one adapter failing does not
    /// affect the others.
    pub async fn store(
        &self,
        record: &Map<String, Value>,
        data_type: Option<DataType>,
    ) -> HashMap<String, bool> {
        let data_type = data_type.unwrap_or_else(|| DataType::infer(record));
        let route = self.routes_for(data_type);
        let route = if route.is_empty() {
            self.unknown_route()
        } else {
            route.to_vec()
        };

        let futures = route.iter().filter_map(|name| {
            let adapter = self.adapters.get(name)?.clone();
            let record = record.clone();
            Some(async move {
                let ok = adapter.store(&record).await.unwrap_or(false);
                (adapter.name().to_string(), ok)
            })
        });

        join_all(futures).await.into_iter().collect()
    }

    /// Groups `records` by inferred (or given) data type, then dispatches
    /// one batch per (type, adapter) pair in parallel.
    pub async fn batch_store(
        &self,
        records: Vec<Map<String, Value>>,
        data_type: Option<DataType>,
    ) -> HashMap<String, bool> {
        let mut grouped: HashMap<DataType, Vec<Map<String, Value>>> = HashMap::new();
        for record in records {
            let dt = data_type.unwrap_or_else(|| DataType::infer(&record));
            grouped.entry(dt).or_default().push(record);
        }

        let mut futures = Vec::new();
        for (dt, batch) in grouped {
            let route = self.routes_for(dt).to_vec();
            let route = if route.is_empty() { self.unknown_route() } else { route };
            for name in route {
                if let Some(adapter) = self.adapters.get(&name).cloned() {
                    let batch = batch.clone();
                    futures.push(async move {
                        let ok = adapter.batch_store(&batch).await.unwrap_or(false);
                        (adapter.name().to_string(), ok)
                    });
                }
            }
        }

        join_all(futures).await.into_iter().collect()
    }

    pub async fn connect_all(&self) -> HashMap<String, bool> {
        let futures = self.adapters.values().map(|adapter| {
            let adapter = adapter.clone();
            async move {
                let ok = adapter.connect().await.unwrap_or(false);
                (adapter.name().to_string(), ok)
            }
        });
        join_all(futures).await.into_iter().collect()
    }

    pub async fn disconnect_all(&self) {
        let futures = self.adapters.values().map(|adapter| {
            let adapter = adapter.clone();
            async move { adapter.disconnect().await }
        });
        join_all(futures).await;
    }

    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let futures = self.adapters.values().map(|adapter| {
            let adapter = adapter.clone();
            async move {
                let ok = adapter.health_check().await;
                (adapter.name().to_string(), ok)
            }
        });
        join_all(futures).await.into_iter().collect()
    }

    pub async fn get_system_stats(&self) -> SystemStats {
        let adapter_health = self.health_check_all().await;
        let routing_table = self
            .routes
            .iter()
            .map(|(dt, adapters)| (dt.as_str().to_string(), adapters.clone()))
            .collect();
        SystemStats {
            adapter_health,
            routing_table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdapter {
        label: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StorageAdapter for CountingAdapter {
        fn name(&self) -> &str {
            self.label
        }
        async fn connect(&self) -> Result<bool, StorageError> {
            Ok(true)
        }
        async fn disconnect(&self) {}
        async fn health_check(&self) -> bool {
            true
        }
        async fn store(&self, _record: &Map<String, Value>) -> Result<bool, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
        async fn batch_store(&self, _records: &[Map<String, Value>]) -> Result<bool, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn alerts_fan_out_to_both_search_and_warehouse() {
        let mut adapters: HashMap<String, Arc<dyn StorageAdapter>> = HashMap::new();
        adapters.insert(
            "search".to_string(),
            Arc::new(CountingAdapter { label: "search", calls: AtomicUsize::new(0) }),
        );
        adapters.insert(
            "warehouse".to_string(),
            Arc::new(CountingAdapter { label: "warehouse", calls: AtomicUsize::new(0) }),
        );
        let manager = StorageManager::new(adapters);
        let record = serde_json::json!({"severity": "critical"}).as_object().unwrap().clone();
        let result = manager.store(&record, None).await;
        assert_eq!(result.get("search"), Some(&true));
        assert_eq!(result.get("warehouse"), Some(&true));
    }
}
