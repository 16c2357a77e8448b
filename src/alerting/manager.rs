//! Alert Manager (C9): owns active alerts, dispatches notifications, and
//! evaluates rules against arbitrary input data.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::domain::{Alert, AlertSeverity};

use super::notification::NotificationChannel;
use super::rule::AlertRule;

#[derive(Debug, Clone, Default)]
pub struct AlertManagerStats {
    pub active_count: usize,
    pub severity_breakdown: HashMap<String, usize>,
    pub channel_count: usize,
    pub rule_count: usize,
}

pub struct AlertManager {
    active: RwLock<HashMap<String, Alert>>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    rules: Vec<AlertRule>,
    min_notification_severity: AlertSeverity,
}

impl AlertManager {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>, rules: Vec<AlertRule>) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            channels,
            rules,
            min_notification_severity: AlertSeverity::Warning,
        }
    }

    pub fn with_min_notification_severity(mut self, severity: AlertSeverity) -> Self {
        self.min_notification_severity = severity;
        self
    }

    /// Creates or returns the existing active alert for `alert_id`
    /// (dedup, no re-notification). Dispatches notifications concurrently
    /// when the severity threshold is met.
    pub async fn create(
        &self,
        alert_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: AlertSeverity,
        source: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Alert {
        let alert_id = alert_id.into();

        if let Some(existing) = self.active.read().get(&alert_id) {
            if existing.status == crate::domain::AlertStatus::Active {
                return existing.clone();
            }
        }

        let alert = Alert::new(alert_id.clone(), title, description, severity, source, metadata);
        self.active.write().insert(alert_id, alert.clone());

        if severity >= self.min_notification_severity {
            self.dispatch(&alert).await;
        }

        alert
    }

    async fn dispatch(&self, alert: &Alert) -> HashMap<String, bool> {
        let futures = self.channels.iter().map(|channel| {
            let channel = channel.clone();
            let alert = alert.clone();
            async move {
                let ok = channel.send(&alert).await;
                (channel.name().to_string(), ok)
            }
        });
        join_all(futures).await.into_iter().collect()
    }

    pub fn acknowledge(&self, alert_id: &str, user: impl Into<String>) -> bool {
        let mut active = self.active.write();
        match active.get_mut(alert_id) {
            Some(alert) => {
                alert.acknowledge(user);
                true
            }
            None => false,
        }
    }

    pub fn resolve(&self, alert_id: &str) -> bool {
        self.active.write().remove(alert_id).is_some()
    }

    pub fn list_active(&self, severity: Option<AlertSeverity>) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .active
            .read()
            .values()
            .filter(|a| severity.map(|s| a.severity == s).unwrap_or(true))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| {
            a.severity
                .display_rank()
                .cmp(&b.severity.display_rank())
                .then(a.timestamp.cmp(&b.timestamp))
        });
        alerts
    }

    /// Evaluates every rule against `data`; rules that fire synthesize an
    /// alert via [`Self::create`] (and therefore dedup/notify the same way
    /// a directly-created alert would).
    pub async fn evaluate_rules(&self, data: &Value) -> Vec<Alert> {
        let mut fired = Vec::new();
        for rule in &self.rules {
            if rule.fires(data) {
                let alert = self
                    .create(
                        format!("{}-{}", rule.id, chrono::Utc::now().timestamp_millis()),
                        rule.title_template.clone(),
                        rule.description_template.clone(),
                        rule.severity,
                        "rule_engine",
                        Map::new(),
                    )
                    .await;
                fired.push(alert);
            }
        }
        fired
    }

    pub fn get_stats(&self) -> AlertManagerStats {
        let active = self.active.read();
        let mut severity_breakdown = HashMap::new();
        for alert in active.values() {
            *severity_breakdown
                .entry(alert.severity.as_str().to_string())
                .or_insert(0) += 1;
        }
        AlertManagerStats {
            active_count: active.len(),
            severity_breakdown,
            channel_count: self.channels.len(),
            rule_count: self.rules.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::rule::{Condition, MatchMode, Operator};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl NotificationChannel for CountingChannel {
        fn name(&self) -> &str {
            "counting"
        }
        async fn send(&self, _alert: &Alert) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn duplicate_active_alert_does_not_renotify() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = AlertManager::new(vec![Arc::new(CountingChannel { calls: calls.clone() })], vec![]);
        manager
            .create("A1", "t", "d", AlertSeverity::Warning, "s", Map::new())
            .await;
        manager
            .create("A1", "t", "d", AlertSeverity::Warning, "s", Map::new())
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn below_threshold_severity_skips_notification() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = AlertManager::new(vec![Arc::new(CountingChannel { calls: calls.clone() })], vec![]);
        manager
            .create("A2", "t", "d", AlertSeverity::Info, "s", Map::new())
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn list_active_sorts_critical_first_then_by_time() {
        let manager = AlertManager::new(vec![], vec![]);
        {
            let mut active = manager.active.write();
            active.insert(
                "warn".into(),
                Alert::new("warn", "t", "d", AlertSeverity::Warning, "s", Map::new()),
            );
            active.insert(
                "crit".into(),
                Alert::new("crit", "t", "d", AlertSeverity::Critical, "s", Map::new()),
            );
        }
        let list = manager.list_active(None);
        assert_eq!(list[0].alert_id, "crit");
    }

    #[tokio::test]
    async fn rule_with_any_mode_fires_and_creates_alert() {
        let rule = AlertRule {
            id: "r1".into(),
            title_template: "Risky".into(),
            description_template: "d".into(),
            severity: AlertSeverity::Error,
            conditions: vec![Condition { field: "confidence".into(), operator: Operator::Gt, value: json!(0.5) }],
            match_mode: MatchMode::Any,
        };
        let manager = AlertManager::new(vec![], vec![rule]);
        let fired = manager.evaluate_rules(&json!({"confidence": 0.9})).await;
        assert_eq!(fired.len(), 1);
    }
}
