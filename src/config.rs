//! Process configuration, read from environment variables at startup.
//!
//! Uses small `default_*` functions rather than a monolithic `Default`
//! impl, so each setting's fallback is documented next to its accessor.

use std::collections::HashMap;

fn default_metrics_port() -> u16 {
    8090
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_consumer_group() -> String {
    "warehouse-pipeline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_aggregation_emit_interval_secs() -> u64 {
    30
}

/// Adapter endpoint configuration, keyed by adapter name. Omitting a key
/// disables that adapter (§6).
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub timeseries_url: Option<String>,
    pub search_url: Option<String>,
    pub warehouse_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    /// Whether to use implicit TLS (SMTPS) rather than STARTTLS negotiated
    /// over a plaintext connection (spec.md: "SMTP with optional TLS").
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub to_emails: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub email: Option<EmailConfig>,
    pub slack_webhook_url: Option<String>,
    pub webhooks: Vec<(String, HashMap<String, String>)>,
}

/// Top-level process configuration. Built from environment variables; see
/// [`Config::from_env`] for the variable names and defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub kafka_brokers: String,
    pub consumer_group: String,
    pub metrics_port: u16,
    pub log_level: String,
    pub redis_url: Option<String>,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    pub min_notification_severity: crate::domain::AlertSeverity,
    /// Interval between Window Aggregator emissions to `aggregated.metrics`
    /// (§4.5's fixed emission tick, mirroring the base crate's periodic
    /// metrics-reporter task shape rather than emitting per event).
    pub aggregation_emit_interval_secs: u64,
}

impl Config {
    /// Reads the process environment per §6: `REDIS_URL` (optional),
    /// `METRICS_PORT` (default 8090), `LOG_LEVEL`, plus the broker/adapter/
    /// notification settings this pipeline adds beyond the distilled
    /// surface.
    pub fn from_env() -> Self {
        Self {
            kafka_brokers: std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| default_kafka_brokers()),
            consumer_group: std::env::var("CONSUMER_GROUP").unwrap_or_else(|_| default_consumer_group()),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_metrics_port),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
            redis_url: std::env::var("REDIS_URL").ok(),
            storage: StorageConfig {
                timeseries_url: std::env::var("TIMESERIES_URL").ok(),
                search_url: std::env::var("SEARCH_URL").ok(),
                warehouse_url: std::env::var("WAREHOUSE_URL").ok(),
            },
            notifications: NotificationConfig {
                email: email_config_from_env(),
                slack_webhook_url: std::env::var("SLACK_WEBHOOK_URL").ok(),
                webhooks: std::env::var("WEBHOOK_URL")
                    .ok()
                    .map(|url| vec![(url, HashMap::new())])
                    .unwrap_or_default(),
            },
            min_notification_severity: std::env::var("MIN_NOTIFICATION_SEVERITY")
                .ok()
                .and_then(|v| crate::domain::AlertSeverity::parse(&v))
                .unwrap_or(crate::domain::AlertSeverity::Warning),
            aggregation_emit_interval_secs: std::env::var("AGGREGATION_EMIT_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_aggregation_emit_interval_secs),
        }
    }
}

fn email_config_from_env() -> Option<EmailConfig> {
    let host = std::env::var("SMTP_HOST").ok()?;
    let from_email = std::env::var("SMTP_FROM").ok()?;
    let to_emails: Vec<String> = std::env::var("SMTP_TO")
        .ok()?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if to_emails.is_empty() {
        return None;
    }
    Some(EmailConfig {
        host,
        port: std::env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(587),
        use_tls: std::env::var("SMTP_USE_TLS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true),
        username: std::env::var("SMTP_USERNAME").ok(),
        password: std::env::var("SMTP_PASSWORD").ok(),
        from_email,
        to_emails,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_config_requires_recipients() {
        std::env::remove_var("SMTP_HOST");
        std::env::remove_var("SMTP_FROM");
        std::env::remove_var("SMTP_TO");
        assert!(email_config_from_env().is_none());
    }
}
