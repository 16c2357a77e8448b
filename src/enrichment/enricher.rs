//! Enricher (C3): attaches item/location metadata, classification, risk
//! scoring and seasonal context to a [`ProcessedEvent`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Datelike;
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::domain::{
    Classification, EnrichedEvent, ProcessedEvent, RiskAssessment, RiskLevel, Season,
    SeasonalContext, Urgency, ValueCategory, VolumeCategory,
};
use crate::enrichment::provider::MetadataProvider;
use crate::util::stable_hash;

const ITEM_CATEGORIES: [&str; 5] = ["Electronics", "Clothing", "Food", "Tools", "Books"];
const ITEM_SUPPLIERS: [&str; 4] = ["Supplier_A", "Supplier_B", "Supplier_C", "Supplier_D"];
const LOCATION_ZONES: [&str; 4] = ["A", "B", "C", "D"];
const LOCATION_TYPES: [&str; 4] = ["storage", "picking", "shipping", "receiving"];

/// L1 cache TTL. The L2 provider path (when wired) uses its own TTL of one
/// hour on the caller's side; the Enricher only owns L1.
const L1_TTL: Duration = Duration::from_secs(3600);

struct CacheEntry {
    value: Map<String, Value>,
    inserted_at: Instant,
}

/// Unbounded-by-count, TTL-expiring in-process cache fronting `provider`.
pub struct Enricher {
    provider: Arc<dyn MetadataProvider>,
    item_cache: DashMap<String, CacheEntry>,
    location_cache: DashMap<String, CacheEntry>,
}

impl Enricher {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            item_cache: DashMap::new(),
            location_cache: DashMap::new(),
        }
    }

    pub fn enrich(&self, processed: ProcessedEvent) -> EnrichedEvent {
        let item_id = processed.item_id().map(str::to_string);
        let location_id = processed.location_id().map(str::to_string);

        let item_details = item_id.as_deref().map(|id| self.lookup_item(id));
        let location_details = location_id.as_deref().map(|id| self.lookup_location(id));

        let classification = classify(&processed, item_details.as_ref());
        let risk_assessment = assess_risk(&processed, &classification, item_details.as_ref());
        let seasonal_context = seasonal_context(&processed, item_details.as_ref());

        EnrichedEvent::new(
            processed,
            item_details,
            location_details,
            classification,
            risk_assessment,
            seasonal_context,
        )
    }

    fn lookup_item(&self, item_id: &str) -> Map<String, Value> {
        if let Some(entry) = self.item_cache.get(item_id) {
            if entry.inserted_at.elapsed() < L1_TTL {
                return entry.value.clone();
            }
        }
        let details = self
            .provider
            .fetch_item(item_id)
            .unwrap_or_else(|| stand_in_item(item_id));
        self.item_cache.insert(
            item_id.to_string(),
            CacheEntry {
                value: details.clone(),
                inserted_at: Instant::now(),
            },
        );
        details
    }

    fn lookup_location(&self, location_id: &str) -> Map<String, Value> {
        if let Some(entry) = self.location_cache.get(location_id) {
            if entry.inserted_at.elapsed() < L1_TTL {
                return entry.value.clone();
            }
        }
        let details = self
            .provider
            .fetch_location(location_id)
            .unwrap_or_else(|| stand_in_location(location_id));
        self.location_cache.insert(
            location_id.to_string(),
            CacheEntry {
                value: details.clone(),
                inserted_at: Instant::now(),
            },
        );
        details
    }
}

fn stand_in_item(item_id: &str) -> Map<String, Value> {
    let hash_val = stable_hash(item_id) % 1000;
    let mut details = Map::new();
    details.insert(
        "category".into(),
        Value::from(ITEM_CATEGORIES[(hash_val % 5) as usize]),
    );
    details.insert(
        "supplier".into(),
        Value::from(ITEM_SUPPLIERS[(hash_val % 4) as usize]),
    );
    details.insert(
        "unit_cost".into(),
        Value::from(round2(10.0 + (hash_val % 100) as f64)),
    );
    details.insert(
        "weight".into(),
        Value::from(round1(0.1 + (hash_val % 50) as f64 * 0.1)),
    );
    details.insert("perishable".into(), Value::from(hash_val % 4 == 0));
    details.insert("high_value".into(), Value::from(hash_val % 10 == 0));
    details.insert(
        "reorder_point".into(),
        Value::from(50 + (hash_val % 100)),
    );
    details.insert("max_stock".into(), Value::from(500 + (hash_val % 1000)));
    details
}

fn stand_in_location(location_id: &str) -> Map<String, Value> {
    let hash_val = stable_hash(location_id) % 100;
    let mut details = Map::new();
    details.insert(
        "zone".into(),
        Value::from(LOCATION_ZONES[(hash_val % 4) as usize]),
    );
    details.insert(
        "location_type".into(),
        Value::from(LOCATION_TYPES[(hash_val % 4) as usize]),
    );
    details.insert("capacity".into(), Value::from(1000 + (hash_val % 5000)));
    details.insert(
        "temperature_controlled".into(),
        Value::from(hash_val % 5 == 0),
    );
    details.insert("automated".into(), Value::from(hash_val % 3 == 0));
    details
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn classify(processed: &ProcessedEvent, item_details: Option<&Map<String, Value>>) -> Classification {
    let volume_category = match processed.quantity_abs {
        q if q < 10.0 => VolumeCategory::Low,
        q if q < 100.0 => VolumeCategory::Medium,
        q if q < 1000.0 => VolumeCategory::High,
        _ => VolumeCategory::Bulk,
    };

    let value_category = match processed.total_value {
        None => ValueCategory::Unknown,
        Some(v) if v < 100.0 => ValueCategory::Low,
        Some(v) if v < 1000.0 => ValueCategory::Medium,
        Some(v) if v < 10000.0 => ValueCategory::High,
        Some(_) => ValueCategory::Critical,
    };

    let is_perishable = item_details
        .and_then(|d| d.get("perishable"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let is_high_value = item_details
        .and_then(|d| d.get("high_value"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let urgency = if is_perishable || is_high_value {
        Urgency::High
    } else if processed.action() == Some("stock_out") {
        Urgency::Medium
    } else {
        Urgency::Low
    };

    Classification {
        event_type: processed
            .get("event_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        volume_category,
        value_category,
        urgency,
    }
}

fn assess_risk(
    processed: &ProcessedEvent,
    classification: &Classification,
    item_details: Option<&Map<String, Value>>,
) -> RiskAssessment {
    let mut score = 0i32;
    let mut factors = Vec::new();

    let is_high_value = item_details
        .and_then(|d| d.get("high_value"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if is_high_value {
        score += 3;
        factors.push("high_value_item".to_string());
    }

    if classification.volume_category == VolumeCategory::Bulk {
        score += 2;
        factors.push("bulk_transaction".to_string());
    }

    if !processed.business_context.is_business_hours {
        score += 1;
        factors.push("after_hours".to_string());
    }

    let is_perishable = item_details
        .and_then(|d| d.get("perishable"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if is_perishable {
        score += 1;
        factors.push("perishable_item".to_string());
    }

    let level = if score >= 5 {
        RiskLevel::High
    } else if score >= 3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        score,
        level,
        factors,
    }
}

fn seasonal_context(processed: &ProcessedEvent, item_details: Option<&Map<String, Value>>) -> SeasonalContext {
    let month = processed.timestamp_parsed.month();
    let season = match month {
        12 | 1 | 2 => Season::Winter,
        3..=5 => Season::Spring,
        6..=8 => Season::Summer,
        _ => Season::Fall,
    };

    let category = item_details
        .and_then(|d| d.get("category"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let seasonal_demand = match (season, category) {
        (Season::Winter, "Clothing") => "high",
        (Season::Summer, "Electronics") => "high",
        _ => "normal",
    }
    .to_string();

    SeasonalContext {
        season,
        month,
        seasonal_demand,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KafkaMetadata;
    use crate::enrichment::provider::NullMetadataProvider;
    use serde_json::json;

    fn kafka_meta() -> KafkaMetadata {
        KafkaMetadata {
            topic: "warehouse.inventory".to_string(),
            partition: 0,
            offset: 0,
            key: None,
        }
    }

    fn processed(value: serde_json::Value) -> ProcessedEvent {
        ProcessedEvent::from_raw(crate::domain::RawEvent::from_json(value).unwrap(), kafka_meta())
    }

    #[test]
    fn stand_in_formulas_are_deterministic() {
        let a = stand_in_item("I1");
        let b = stand_in_item("I1");
        assert_eq!(a, b);
    }

    #[test]
    fn bulk_high_value_after_hours_scores_high_risk() {
        let enricher = Enricher::new(Arc::new(NullMetadataProvider));
        let ev = processed(json!({
            "event_type": "inventory",
            "item_id": "HV1",
            "action": "stock_out",
            "quantity": 2000,
            "unit_price": 500,
            "timestamp": "2024-03-11T23:30:00Z"
        }));
        let enriched = enricher.enrich(ev);
        assert_eq!(enriched.classification.volume_category, VolumeCategory::Bulk);
        // HV1's stand-in high_value flag depends on its hash; assert the
        // factor list is internally consistent with it rather than pinning
        // the literal boolean.
        if enriched.is_high_value() {
            assert!(enriched.risk_assessment.factors.contains(&"high_value_item".to_string()));
        }
        assert!(enriched.risk_assessment.factors.contains(&"bulk_transaction".to_string()));
        assert!(enriched.risk_assessment.factors.contains(&"after_hours".to_string()));
    }

    #[test]
    fn volume_category_boundaries() {
        let mk = |q: f64| {
            let ev = processed(json!({
                "event_type": "inventory",
                "item_id": "B1",
                "action": "stock_in",
                "quantity": q,
                "timestamp": "2024-03-11T10:00:00Z"
            }));
            classify(&ev, None).volume_category
        };
        assert_eq!(mk(9.0), VolumeCategory::Low);
        assert_eq!(mk(10.0), VolumeCategory::Medium);
        assert_eq!(mk(99.0), VolumeCategory::Medium);
        assert_eq!(mk(100.0), VolumeCategory::High);
        assert_eq!(mk(999.0), VolumeCategory::High);
        assert_eq!(mk(1000.0), VolumeCategory::Bulk);
    }
}
