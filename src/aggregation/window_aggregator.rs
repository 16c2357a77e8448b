//! Window Aggregator (C5): maintains named sliding time windows over
//! enriched events and emits throughput, volume, value, quality and
//! distribution metrics.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EnrichedEvent, TimeWindow};

const TOP_N: usize = 10;
const PERCENTILES: [f64; 5] = [50.0, 75.0, 90.0, 95.0, 99.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowName {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
}

impl WindowName {
    pub const ALL: [WindowName; 4] = [
        WindowName::OneMinute,
        WindowName::FiveMinutes,
        WindowName::FifteenMinutes,
        WindowName::OneHour,
    ];

    fn duration(self) -> Duration {
        match self {
            WindowName::OneMinute => Duration::minutes(1),
            WindowName::FiveMinutes => Duration::minutes(5),
            WindowName::FifteenMinutes => Duration::minutes(15),
            WindowName::OneHour => Duration::hours(1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowName::OneMinute => "1min",
            WindowName::FiveMinutes => "5min",
            WindowName::FifteenMinutes => "15min",
            WindowName::OneHour => "1hour",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    pub median: f64,
    pub percentiles: HashMap<String, f64>,
}

impl DistributionStats {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = sorted.len() as f64;
        let sum: f64 = sorted.iter().sum();
        let mean = sum / n;
        let std = if sorted.len() <= 1 {
            0.0
        } else {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
        };
        let percentiles = PERCENTILES
            .iter()
            .map(|p| (p.to_string(), percentile(&sorted, *p)))
            .collect();
        Self {
            count: sorted.len(),
            sum,
            mean,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            std,
            median: percentile(&sorted, 50.0),
            percentiles,
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Least-squares slope of `values` against their index.
fn trend_slope(values: &[f64]) -> Trend {
    if values.len() < 3 {
        return Trend::InsufficientData;
    }
    let n = values.len() as f64;
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = values.iter().sum::<f64>() / n;
    let numerator: f64 = xs
        .iter()
        .zip(values.iter())
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let denominator: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    if denominator == 0.0 {
        return Trend::Stable;
    }
    let slope = numerator / denominator;
    if slope > 0.1 {
        Trend::Increasing
    } else if slope < -0.1 {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub item_id_completeness: f64,
    pub location_id_completeness: f64,
    pub quantity_validity: f64,
    pub anomaly_rate: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub window: String,
    pub emitted_at: DateTime<Utc>,
    pub transactions: usize,
    pub volume: f64,
    pub value: f64,
    pub unique_items: usize,
    pub unique_locations: usize,
    pub unique_suppliers: usize,
    pub top_items: Vec<(String, usize)>,
    pub distribution_by_location: HashMap<String, (usize, f64)>,
    pub distribution_by_action: HashMap<String, (usize, f64)>,
    pub distribution_by_supplier: HashMap<String, (usize, f64)>,
    pub transactions_per_minute: f64,
    pub volume_per_minute: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiveMinuteSnapshot {
    pub volume: DistributionStats,
    pub volume_by_action: HashMap<String, DistributionStats>,
    pub volume_trend: Trend,
    pub value: DistributionStats,
    pub high_value_transaction_count: usize,
    pub quality: QualityMetrics,
}

struct WindowState {
    window: TimeWindow<Arc<EnrichedEvent>>,
}

/// Owns the four named sliding windows and produces snapshots either on
/// demand or on the aggregator's periodic emission tick.
pub struct WindowAggregator {
    windows: HashMap<WindowName, WindowState>,
    anomalies_in_window: HashMap<WindowName, TimeWindow<bool>>,
}

impl WindowAggregator {
    pub fn new() -> Self {
        let mut windows = HashMap::new();
        let mut anomalies_in_window = HashMap::new();
        for name in WindowName::ALL {
            windows.insert(
                name,
                WindowState {
                    window: TimeWindow::new(name.duration()),
                },
            );
            anomalies_in_window.insert(name, TimeWindow::new(name.duration()));
        }
        Self {
            windows,
            anomalies_in_window,
        }
    }

    /// Appends `event` (and whether C4 flagged it as an anomaly) to every
    /// named window, evicting stale entries. Called inline for every event,
    /// independent of the emission tick.
    pub fn record(&mut self, event: Arc<EnrichedEvent>, is_anomaly: bool) {
        let ts = event.processed().timestamp_parsed;
        for name in WindowName::ALL {
            self.windows.get_mut(&name).unwrap().window.add(ts, event.clone());
            self.anomalies_in_window
                .get_mut(&name)
                .unwrap()
                .add(ts, is_anomaly);
        }
    }

    pub fn snapshot(&self, name: WindowName) -> WindowSnapshot {
        let state = &self.windows[&name];
        let events: Vec<&Arc<EnrichedEvent>> = state.window.iter().collect();
        let transactions = events.len();
        let volume: f64 = events.iter().map(|e| e.processed().quantity_abs).sum();
        let value: f64 = events.iter().filter_map(|e| e.processed().total_value).sum();

        let unique_items = count_unique(events.iter().filter_map(|e| e.item_id()));
        let unique_locations = count_unique(events.iter().filter_map(|e| e.location_id()));
        let unique_suppliers = count_unique(events.iter().filter_map(|e| e.supplier()));

        let top_items = top_n_by_count(events.iter().filter_map(|e| e.item_id()), TOP_N);

        let distribution_by_location =
            distribution(events.iter().filter_map(|e| e.location_id()), transactions);
        let distribution_by_action =
            distribution(events.iter().filter_map(|e| e.action()), transactions);
        let distribution_by_supplier =
            distribution(events.iter().filter_map(|e| e.supplier()), transactions);

        let minutes = name.duration().num_seconds() as f64 / 60.0;
        let transactions_per_minute = transactions as f64 / minutes;
        let volume_per_minute = volume / minutes;

        WindowSnapshot {
            window: name.as_str().to_string(),
            emitted_at: Utc::now(),
            transactions,
            volume,
            value,
            unique_items,
            unique_locations,
            unique_suppliers,
            top_items,
            distribution_by_location,
            distribution_by_action,
            distribution_by_supplier,
            transactions_per_minute,
            volume_per_minute,
        }
    }

    /// 5-minute-window-specific volume/value/quality metrics. The spec
    /// pins these to the 5-minute window only.
    pub fn five_minute_metrics(&self) -> FiveMinuteSnapshot {
        let state = &self.windows[&WindowName::FiveMinutes];
        let events: Vec<&Arc<EnrichedEvent>> = state.window.iter().collect();

        let volumes: Vec<f64> = events.iter().map(|e| e.processed().quantity_abs).collect();
        let volume = DistributionStats::from_values(&volumes);

        let mut by_action: HashMap<String, Vec<f64>> = HashMap::new();
        for e in &events {
            if let Some(action) = e.action() {
                by_action
                    .entry(action.to_string())
                    .or_default()
                    .push(e.processed().quantity_abs);
            }
        }
        let volume_by_action = by_action
            .into_iter()
            .map(|(k, v)| (k, DistributionStats::from_values(&v)))
            .collect();

        let volume_trend = trend_slope(&volumes);

        let values: Vec<f64> = events
            .iter()
            .filter_map(|e| e.processed().total_value)
            .collect();
        let value = DistributionStats::from_values(&values);
        let high_value_threshold = value.mean + 2.0 * value.std;
        let high_value_transaction_count = events
            .iter()
            .filter(|e| {
                e.processed()
                    .total_value
                    .map(|v| v > high_value_threshold)
                    .unwrap_or(false)
            })
            .count();

        let anomalies: Vec<bool> = self.anomalies_in_window[&WindowName::FiveMinutes]
            .iter()
            .copied()
            .collect();
        let anomaly_rate = if anomalies.is_empty() {
            0.0
        } else {
            anomalies.iter().filter(|a| **a).count() as f64 / anomalies.len() as f64
        };

        let item_id_completeness = ratio(events.iter().filter(|e| e.item_id().is_some()).count(), events.len());
        let location_id_completeness =
            ratio(events.iter().filter(|e| e.location_id().is_some()).count(), events.len());
        let quantity_validity = ratio(
            events
                .iter()
                .filter(|e| e.processed().quantity_abs > 0.0)
                .count(),
            events.len(),
        );

        let score = 100.0
            - (1.0 - item_id_completeness) * 30.0
            - (1.0 - location_id_completeness) * 20.0
            - (1.0 - quantity_validity) * 30.0
            - anomaly_rate * 20.0;

        FiveMinuteSnapshot {
            volume,
            volume_by_action,
            volume_trend,
            value,
            high_value_transaction_count,
            quality: QualityMetrics {
                item_id_completeness,
                location_id_completeness,
                quantity_validity,
                anomaly_rate,
                score: score.max(0.0),
            },
        }
    }
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn count_unique<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values.collect::<std::collections::HashSet<_>>().len()
}

fn top_n_by_count<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut entries: Vec<(String, usize)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

fn distribution<'a>(
    values: impl Iterator<Item = &'a str>,
    total: usize,
) -> HashMap<String, (usize, f64)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(k, count)| {
            let pct = if total == 0 { 0.0 } else { count as f64 / total as f64 * 100.0 };
            (k.to_string(), (count, pct))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        enriched_event::{Classification, RiskAssessment, RiskLevel, Season, SeasonalContext, Urgency, ValueCategory, VolumeCategory},
        KafkaMetadata, ProcessedEvent, RawEvent,
    };
    use chrono::TimeZone;
    use serde_json::json;

    fn event(item_id: &str, quantity: f64, minute: i64) -> Arc<EnrichedEvent> {
        let ts = Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap();
        let raw = RawEvent::from_json(json!({
            "event_type": "inventory",
            "item_id": item_id,
            "action": "stock_in",
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
        Arc::new(EnrichedEvent::new(
            processed,
            None,
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
    fn one_minute_window_evicts_older_entries() {
        let mut agg = WindowAggregator::new();
        agg.record(event("I1", 10.0, 0), false);
        agg.record(event("I2", 5.0, 2), false);
        let snap = agg.snapshot(WindowName::OneMinute);
        assert_eq!(snap.transactions, 1);
        assert_eq!(snap.unique_items, 1);
    }

    #[test]
    fn top_items_break_ties_alphabetically() {
        let items = vec!["b", "a", "b", "a"];
        let top = top_n_by_count(items.into_iter(), 10);
        assert_eq!(top, vec![("a".to_string(), 2), ("b".to_string(), 2)]);
    }

    #[test]
    fn trend_needs_at_least_three_points() {
        assert_eq!(trend_slope(&[1.0, 2.0]), Trend::InsufficientData);
        assert_eq!(trend_slope(&[1.0, 2.0, 3.0, 4.0]), Trend::Increasing);
        assert_eq!(trend_slope(&[4.0, 3.0, 2.0, 1.0]), Trend::Decreasing);
        assert_eq!(trend_slope(&[2.0, 2.0, 2.0]), Trend::Stable);
    }
}
