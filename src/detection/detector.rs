//! Anomaly Detector (C4): statistical and domain-rule detectors over a
//! bounded sample window.

use std::sync::Arc;

use chrono::Duration;
use serde_json::{Map, Value};

use crate::domain::anomaly::Severity;
use crate::domain::{AnomalyResult, EnrichedEvent};
use crate::detection::sample_window::{z_score, SampleWindow};
use crate::detection::stock::StockLevelProvider;

fn details(reason: String) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("reason".into(), Value::from(reason));
    map
}

const DEFAULT_WINDOW_CAPACITY: usize = 1000;
const Z_SCORE_THRESHOLD: f64 = 3.0;

pub struct AnomalyDetector {
    window: SampleWindow,
    stock_provider: Arc<dyn StockLevelProvider>,
}

impl AnomalyDetector {
    pub fn new(stock_provider: Arc<dyn StockLevelProvider>) -> Self {
        Self {
            window: SampleWindow::new(DEFAULT_WINDOW_CAPACITY),
            stock_provider,
        }
    }

    pub fn with_capacity(capacity: usize, stock_provider: Arc<dyn StockLevelProvider>) -> Self {
        Self {
            window: SampleWindow::new(capacity),
            stock_provider,
        }
    }

    /// Runs every detector against the current window, then pushes `event`
    /// into the window for future comparisons. Historical samples consulted
    /// by each detector never include the event being evaluated.
    pub fn detect(&mut self, event: Arc<EnrichedEvent>) -> AnomalyResult {
        let mut results = Vec::with_capacity(8);

        if let Some(r) = self.volume_anomaly(&event) {
            results.push(r);
        }
        if let Some(r) = self.time_based_anomaly(&event) {
            results.push(r);
        }
        if let Some(r) = self.frequency_anomaly(&event) {
            results.push(r);
        }
        if let Some(r) = self.negative_stock_risk(&event) {
            results.push(r);
        }
        if let Some(r) = self.rapid_depletion(&event) {
            results.push(r);
        }
        let unusual_location = self.unusual_location_frequency(&event);
        if let Some(freq) = unusual_location {
            if freq < 0.05 {
                results.push(AnomalyResult::new(
                    "unusual_location",
                    1.0 - freq,
                    Severity::Medium,
                    details(format!("location frequency {freq:.4} below 0.05 threshold")),
                ));
            }
        }
        if let Some(r) = self.high_value_risk_combination(&event, unusual_location) {
            results.push(r);
        }
        if let Some(r) = self.supplier_pattern(&event) {
            results.push(r);
        }

        self.window.push(event);

        AnomalyResult::most_significant(results)
    }

    fn volume_anomaly(&self, event: &EnrichedEvent) -> Option<AnomalyResult> {
        let (action, item_id) = (event.action()?, event.item_id()?);
        let historical: Vec<f64> = self
            .window
            .matching_pattern(action, item_id)
            .map(|e| e.processed().quantity_abs)
            .collect();
        if historical.len() < 5 {
            return None;
        }
        let z = z_score(event.processed().quantity_abs, &historical)?;
        if z > Z_SCORE_THRESHOLD {
            let severity = if z > 5.0 { Severity::High } else { Severity::Medium };
            Some(AnomalyResult::new(
                "volume_anomaly",
                (z / Z_SCORE_THRESHOLD).min(1.0),
                severity,
                details(format!("z-score {z:.2} for pattern {action}/{item_id}")),
            ))
        } else {
            None
        }
    }

    fn time_based_anomaly(&self, event: &EnrichedEvent) -> Option<AnomalyResult> {
        if !event.is_after_hours() {
            return None;
        }
        let action = event.action()?;
        let matching: Vec<_> = self.window.matching_action(action).collect();
        let freq = if matching.is_empty() {
            // No history at all: treat as moderately likely rather than
            // flagging every first-seen action as anomalous.
            0.5
        } else {
            let after_hours = matching.iter().filter(|e| e.is_after_hours()).count();
            after_hours as f64 / matching.len() as f64
        };
        if freq < 0.1 {
            Some(AnomalyResult::new(
                "time_based_anomaly",
                0.7,
                Severity::Medium,
                details(format!("after-hours frequency {freq:.4} for action {action}")),
            ))
        } else {
            None
        }
    }

    fn frequency_anomaly(&self, event: &EnrichedEvent) -> Option<AnomalyResult> {
        let (action, item_id) = (event.action()?, event.item_id()?);
        let now = event.processed().timestamp_parsed;

        let current_hour_count = self
            .window
            .for_item_within(item_id, now, Duration::hours(1))
            .filter(|e| e.action() == Some(action))
            .count() as f64;

        // Bucket the remaining history (older than the last hour) into
        // hourly buckets relative to `now`, per the in-memory-window
        // option for the historical-frequency cache.
        let mut bucket_counts: Vec<f64> = Vec::new();
        for bucket in 1..24 {
            let upper = now - Duration::hours(bucket - 1);
            let lower = now - Duration::hours(bucket);
            let count = self
                .window
                .matching_pattern(action, item_id)
                .filter(|e| {
                    let ts = e.processed().timestamp_parsed;
                    ts >= lower && ts < upper
                })
                .count();
            if count > 0 {
                bucket_counts.push(count as f64);
            }
        }

        if bucket_counts.len() < 5 {
            return None;
        }

        let z = z_score(current_hour_count, &bucket_counts)?;
        if z > Z_SCORE_THRESHOLD {
            let severity = if z > 5.0 { Severity::High } else { Severity::Medium };
            Some(AnomalyResult::new(
                "frequency_anomaly",
                (z / Z_SCORE_THRESHOLD).min(1.0),
                severity,
                details(format!("hourly frequency z-score {z:.2} for pattern {action}/{item_id}")),
            ))
        } else {
            None
        }
    }

    fn current_stock(&self, item_id: &str, now: chrono::DateTime<chrono::Utc>) -> f64 {
        let baseline = self.stock_provider.baseline_stock(item_id);
        let running_sum: f64 = self
            .window
            .iter()
            .filter(|e| e.item_id() == Some(item_id) && e.processed().timestamp_parsed <= now)
            .map(|e| e.processed().quantity_normalized)
            .sum();
        (baseline + running_sum).max(0.0)
    }

    fn negative_stock_risk(&self, event: &EnrichedEvent) -> Option<AnomalyResult> {
        if event.action() != Some("stock_out") {
            return None;
        }
        let item_id = event.item_id()?;
        let now = event.processed().timestamp_parsed;
        let baseline = self.stock_provider.baseline_stock(item_id);
        let running_sum: f64 = self
            .window
            .iter()
            .filter(|e| e.item_id() == Some(item_id) && e.processed().timestamp_parsed <= now)
            .map(|e| e.processed().quantity_normalized)
            .sum();
        let projected = baseline + running_sum + event.processed().quantity_normalized;
        if projected < -10.0 {
            Some(AnomalyResult::new(
                "negative_stock_risk",
                0.9,
                Severity::High,
                details(format!("projected stock {projected:.2} for item {item_id}")),
            ))
        } else {
            None
        }
    }

    fn rapid_depletion(&self, event: &EnrichedEvent) -> Option<AnomalyResult> {
        if event.action() != Some("stock_out") {
            return None;
        }
        let item_id = event.item_id()?;
        let now = event.processed().timestamp_parsed;
        let current_stock = self.current_stock(item_id, now);
        if current_stock <= 0.0 {
            return None;
        }
        let depleted_last_hour: f64 = self
            .window
            .for_item_within(item_id, now, Duration::hours(1))
            .filter(|e| e.action() == Some("stock_out"))
            .map(|e| e.processed().quantity_abs)
            .sum::<f64>()
            + event.processed().quantity_abs;

        let ratio = depleted_last_hour / current_stock;
        if ratio > 0.8 {
            Some(AnomalyResult::new(
                "rapid_depletion",
                ratio.min(1.0),
                Severity::High,
                details(format!("depleted {depleted_last_hour:.2} of {current_stock:.2} stock for item {item_id} in 1h")),
            ))
        } else {
            None
        }
    }

    /// Fraction of this item's historical window entries sharing the
    /// event's location. `None` when fewer than 5 historical samples exist
    /// for the item.
    fn unusual_location_frequency(&self, event: &EnrichedEvent) -> Option<f64> {
        let (item_id, location_id) = (event.item_id()?, event.location_id()?);
        let for_item: Vec<_> = self
            .window
            .iter()
            .filter(|e| e.item_id() == Some(item_id))
            .collect();
        if for_item.len() < 5 {
            return None;
        }
        let matching = for_item
            .iter()
            .filter(|e| e.location_id() == Some(location_id))
            .count();
        Some(matching as f64 / for_item.len() as f64)
    }

    fn high_value_risk_combination(
        &self,
        event: &EnrichedEvent,
        unusual_location_freq: Option<f64>,
    ) -> Option<AnomalyResult> {
        if !event.is_high_value() {
            return None;
        }
        let unusual_location = unusual_location_freq.map(|f| f < 0.05).unwrap_or(false);
        let signals = [event.is_after_hours(), event.is_bulk(), unusual_location];
        let count = signals.iter().filter(|s| **s).count();
        if count >= 2 {
            Some(AnomalyResult::new(
                "high_value_risk_combination",
                0.8,
                Severity::High,
                details(format!("{count} of 3 risk signals present for high-value item")),
            ))
        } else {
            None
        }
    }

    fn supplier_pattern(&self, event: &EnrichedEvent) -> Option<AnomalyResult> {
        if event.action() != Some("stock_in") {
            return None;
        }
        if !event.is_weekend() {
            return None;
        }
        let supplier = event.supplier()?;
        let mut recent: Vec<_> = self
            .window
            .iter()
            .filter(|e| e.supplier() == Some(supplier) && e.action() == Some("stock_in"))
            .collect();
        recent.sort_by_key(|e| e.processed().timestamp_parsed);
        let last_ten: Vec<_> = recent.into_iter().rev().take(10).collect();
        if last_ten.len() < 3 {
            return None;
        }
        let weekend_count = last_ten.iter().filter(|e| e.is_weekend()).count();
        let freq = weekend_count as f64 / last_ten.len() as f64;
        if freq < 0.1 {
            Some(AnomalyResult::new(
                "supplier_pattern",
                0.7,
                Severity::Low,
                details(format!("weekend delivery frequency {freq:.4} for supplier {supplier}")),
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::stock::PlaceholderStockLevelProvider;
    use crate::domain::{Classification, KafkaMetadata, ProcessedEvent, RawEvent, RiskAssessment};
    use crate::domain::enriched_event::{RiskLevel, Season, SeasonalContext, Urgency, ValueCategory, VolumeCategory};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn enriched(item_id: &str, action: &str, quantity: f64, hour: u32, high_value: bool) -> Arc<EnrichedEvent> {
        let ts = Utc.with_ymd_and_hms(2024, 3, 11, hour, 0, 0).unwrap();
        let raw = RawEvent::from_json(json!({
            "event_type": "inventory",
            "item_id": item_id,
            "action": action,
            "quantity": quantity,
            "timestamp": ts.to_rfc3339(),
        }))
        .unwrap();
        let processed = ProcessedEvent::from_raw(
            raw,
            KafkaMetadata {
                topic: "warehouse.inventory".into(),
                partition: 0,
                offset: 0,
                key: None,
            },
        );
        let mut item_details = serde_json::Map::new();
        item_details.insert("high_value".into(), json!(high_value));
        Arc::new(EnrichedEvent::new(
            processed,
            Some(item_details),
            None,
            Classification {
                event_type: "inventory".into(),
                volume_category: VolumeCategory::Low,
                value_category: ValueCategory::Unknown,
                urgency: Urgency::Low,
            },
            RiskAssessment {
                score: 0,
                level: RiskLevel::Low,
                factors: vec![],
            },
            SeasonalContext {
                season: Season::Spring,
                month: 3,
                seasonal_demand: "normal".into(),
            },
        ))
    }

    #[test]
    fn flags_volume_anomaly_after_five_consistent_samples() {
        let mut detector = AnomalyDetector::new(Arc::new(PlaceholderStockLevelProvider));
        for _ in 0..6 {
            let result = detector.detect(enriched("I1", "stock_in", 10.0, 10, false));
            assert!(!result.is_anomaly);
        }
        let spike = detector.detect(enriched("I1", "stock_in", 500.0, 10, false));
        assert!(spike.is_anomaly);
        assert_eq!(spike.anomaly_type, "volume_anomaly");
    }

    #[test]
    fn no_anomaly_on_empty_window() {
        let mut detector = AnomalyDetector::new(Arc::new(PlaceholderStockLevelProvider));
        let result = detector.detect(enriched("I1", "stock_in", 10.0, 10, false));
        assert!(!result.is_anomaly);
    }
}
