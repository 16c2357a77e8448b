//! Process-wide application context (§5's `AppContext` guidance): built
//! once at startup and handed out as `Arc<AppContext>` to every consumer
//! worker and HTTP handler. Replaces a `lazy_static`/`once_cell` global
//! with a single constructed value; the only process-wide `const` data
//! left outside it is the genuinely static stand-in tables in
//! [`crate::enrichment::enricher`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::aggregation::WindowAggregator;
use crate::alerting::notification::{SlackChannel, WebhookChannel};
use crate::alerting::{AlertManager, NotificationChannel};
use crate::bus::BusClient;
use crate::config::Config;
use crate::detection::{AnomalyDetector, PlaceholderStockLevelProvider};
use crate::enrichment::{Enricher, NullMetadataProvider};
use crate::storage::adapters::{SearchAdapter, TimeSeriesAdapter, WarehouseAdapter};
use crate::storage::StorageManager;

/// Everything a worker or HTTP handler needs, constructed once.
pub struct AppContext {
    pub config: Config,
    pub bus: Arc<BusClient>,
    pub storage: Arc<StorageManager>,
    pub alerts: Arc<AlertManager>,
    pub pipeline: Arc<crate::consumer::PipelineStages>,
    #[cfg(feature = "metrics")]
    pub metrics: Arc<crate::metrics::PipelineMetrics>,
    started_at: Instant,
}

impl AppContext {
    pub fn build(config: Config) -> anyhow::Result<Arc<Self>> {
        let bus = Arc::new(BusClient::new(config.kafka_brokers.clone()));

        let mut adapters: HashMap<String, Arc<dyn crate::storage::StorageAdapter>> = HashMap::new();
        if let Some(url) = &config.storage.timeseries_url {
            adapters.insert("timeseries".to_string(), Arc::new(TimeSeriesAdapter::new(url.clone())));
        }
        if let Some(url) = &config.storage.search_url {
            adapters.insert("search".to_string(), Arc::new(SearchAdapter::new(url.clone())));
        }
        if let Some(url) = &config.storage.warehouse_url {
            adapters.insert("warehouse".to_string(), Arc::new(WarehouseAdapter::new(url.clone())));
        }
        let storage = Arc::new(StorageManager::new(adapters));

        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        if let Some(email) = &config.notifications.email {
            #[cfg(feature = "email")]
            {
                let credentials = match (&email.username, &email.password) {
                    (Some(u), Some(p)) => Some((u.clone(), p.clone())),
                    _ => None,
                };
                match crate::alerting::notification::EmailChannel::new(
                    &email.host,
                    email.port,
                    email.use_tls,
                    credentials,
                    email.from_email.clone(),
                    email.to_emails.clone(),
                ) {
                    Ok(channel) => channels.push(Arc::new(channel)),
                    Err(e) => tracing::warn!(error = %e, "skipping email channel: failed to build SMTP transport"),
                }
            }
            #[cfg(not(feature = "email"))]
            {
                let _ = email;
            }
        }
        if let Some(webhook_url) = &config.notifications.slack_webhook_url {
            channels.push(Arc::new(SlackChannel::new(webhook_url.clone())));
        }
        for (url, headers) in &config.notifications.webhooks {
            channels.push(Arc::new(WebhookChannel::new(url.clone(), headers.clone())));
        }

        let alerts = Arc::new(
            AlertManager::new(channels, Vec::new())
                .with_min_notification_severity(config.min_notification_severity),
        );

        let pipeline = Arc::new(crate::consumer::PipelineStages {
            enricher: Arc::new(Enricher::new(Arc::new(NullMetadataProvider))),
            detector: Mutex::new(AnomalyDetector::new(Arc::new(PlaceholderStockLevelProvider))),
            aggregator: Mutex::new(WindowAggregator::new()),
        });

        Ok(Arc::new(Self {
            config,
            bus,
            storage,
            alerts,
            pipeline,
            #[cfg(feature = "metrics")]
            metrics: Arc::new(crate::metrics::PipelineMetrics::new()),
            started_at: Instant::now(),
        }))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_every_optional_integration_disabled() {
        let config = Config {
            kafka_brokers: "localhost:9092".to_string(),
            consumer_group: "test".to_string(),
            metrics_port: 8090,
            log_level: "info".to_string(),
            redis_url: None,
            storage: crate::config::StorageConfig::default(),
            notifications: crate::config::NotificationConfig::default(),
            min_notification_severity: crate::domain::AlertSeverity::Warning,
            aggregation_emit_interval_secs: 30,
        };
        let ctx = AppContext::build(config).unwrap();
        assert_eq!(ctx.uptime_seconds(), 0);
    }
}
