//! Notification channels the Alert Manager dispatches to on alert
//! creation.

#[cfg(feature = "email")]
pub mod email;
pub mod slack;
pub mod webhook;

#[cfg(feature = "email")]
pub use email::EmailChannel;
pub use slack::SlackChannel;
pub use webhook::WebhookChannel;

use async_trait::async_trait;

use crate::domain::Alert;

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, alert: &Alert) -> bool;
}

/// Severity display color shared by the email and chat-webhook channels.
pub(crate) fn severity_color(severity: crate::domain::AlertSeverity) -> &'static str {
    use crate::domain::AlertSeverity::*;
    match severity {
        Critical => "#d32f2f",
        Error => "#f57c00",
        Warning => "#fbc02d",
        Info => "#1976d2",
    }
}

pub(crate) fn severity_emoji(severity: crate::domain::AlertSeverity) -> &'static str {
    use crate::domain::AlertSeverity::*;
    match severity {
        Critical => "🔴",
        Error => "🟠",
        Warning => "🟡",
        Info => "🔵",
    }
}
