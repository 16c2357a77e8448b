//! Generic JSON webhook notification channel with configurable headers.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::domain::Alert;

use super::NotificationChannel;

pub struct WebhookChannel {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            headers,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> bool {
        let payload = json!({
            "alert_id": alert.alert_id,
            "title": alert.title,
            "description": alert.description,
            "severity": alert.severity.as_str(),
            "source": alert.source,
            "timestamp": alert.timestamp,
            "metadata": alert.metadata,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "webhook channel: send failed");
                false
            }
        }
    }
}
