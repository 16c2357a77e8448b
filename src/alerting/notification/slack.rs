//! Chat webhook notification channel (Slack-compatible incoming webhook
//! payload shape).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::domain::Alert;

use super::{severity_color, severity_emoji, NotificationChannel};

pub struct SlackChannel {
    client: Client,
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, alert: &Alert) -> bool {
        let payload = json!({
            "text": format!("{} {}", severity_emoji(alert.severity), alert.title),
            "attachments": [{
                "color": severity_color(alert.severity),
                "fields": [
                    {"title": "Description", "value": alert.description, "short": false},
                    {"title": "Severity", "value": alert.severity.as_str(), "short": true},
                    {"title": "Source", "value": alert.source, "short": true},
                ],
            }],
        });

        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "slack channel: send failed");
                false
            }
        }
    }
}
