//! Output of the Event Processor (C2): deterministic, I/O-free normalization
//! of a [`RawEvent`].

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::raw_event::RawEvent;

/// `stock_in -> inbound`, `stock_out -> outbound`, everything else passes
/// through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedAction {
    Inbound,
    Outbound,
    Adjustment,
    Transfer,
    Unknown,
}

impl NormalizedAction {
    fn from_raw(action: Option<&str>) -> Self {
        match action {
            Some("stock_in") => NormalizedAction::Inbound,
            Some("stock_out") => NormalizedAction::Outbound,
            Some("adjustment") => NormalizedAction::Adjustment,
            Some("transfer") => NormalizedAction::Transfer,
            _ => NormalizedAction::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedAction::Inbound => "inbound",
            NormalizedAction::Outbound => "outbound",
            NormalizedAction::Adjustment => "adjustment",
            NormalizedAction::Transfer => "transfer",
            NormalizedAction::Unknown => "unknown",
        }
    }
}

/// morning [6,14), afternoon [14,22), night otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
}

impl Shift {
    fn from_hour(hour: u32) -> Self {
        if (6..14).contains(&hour) {
            Shift::Morning
        } else if (14..22).contains(&hour) {
            Shift::Afternoon
        } else {
            Shift::Night
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Afternoon => "afternoon",
            Shift::Night => "night",
        }
    }
}

/// Business-hours context derived from the parsed, UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub hour: u32,
    pub day_of_week: u32,
    pub is_business_hours: bool,
    pub is_weekend: bool,
    pub shift: Shift,
}

impl BusinessContext {
    fn derive(timestamp: DateTime<Utc>) -> Self {
        let hour = timestamp.hour();
        // chrono's Monday = 0 matches the spec's `day_of_week < 5` == Mon-Fri.
        let day_of_week = timestamp.weekday().num_days_from_monday();
        let is_business_hours = (8..=18).contains(&hour) && day_of_week < 5;
        let is_weekend = day_of_week >= 5;
        Self {
            hour,
            day_of_week,
            is_business_hours,
            is_weekend,
            shift: Shift::from_hour(hour),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaMetadata {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMeta {
    pub processed_at: DateTime<Utc>,
    pub kafka_metadata: KafkaMetadata,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timestamp_fallback: bool,
}

/// Output of C2: all of [`RawEvent`]'s fields plus derived, typed context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    #[serde(flatten)]
    raw: Map<String, Value>,
    pub timestamp_parsed: DateTime<Utc>,
    pub quantity_abs: f64,
    pub quantity_normalized: f64,
    pub normalized_action: NormalizedAction,
    pub business_context: BusinessContext,
    pub total_value: Option<f64>,
    pub processing: ProcessingMeta,
}

/// Accepts ISO-8601 (including a trailing `Z`) or epoch seconds (int or
/// float). Returns `None` on failure so the caller can fall back to `now()`
/// and tag the fallback, per the processor's "never raises" contract.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            let whole = secs.trunc() as i64;
            let nanos = ((secs.fract()) * 1_000_000_000.0).round() as u32;
            Utc.timestamp_opt(whole, nanos).single()
        }
        _ => None,
    }
}

impl ProcessedEvent {
    /// Runs the full C2 algorithm against a raw bus record and its
    /// delivery metadata.
    pub fn from_raw(raw: RawEvent, kafka_metadata: KafkaMetadata) -> Self {
        let quantity = raw.quantity().unwrap_or(0.0);
        let action = raw.action();
        let normalized_action = NormalizedAction::from_raw(action);
        let quantity_abs = quantity.abs();
        let quantity_normalized = if action == Some("stock_out") {
            -quantity_abs
        } else {
            quantity_abs
        };

        let (timestamp_parsed, timestamp_fallback) = match parse_timestamp(raw.timestamp_raw()) {
            Some(ts) => (ts, false),
            None => (Utc::now(), true),
        };

        let total_value = raw.unit_price().map(|price| quantity_abs * price);
        let business_context = BusinessContext::derive(timestamp_parsed);

        let processing = ProcessingMeta {
            processed_at: Utc::now(),
            kafka_metadata,
            timestamp_fallback,
        };

        Self {
            raw: raw.into_fields(),
            timestamp_parsed,
            quantity_abs,
            quantity_normalized,
            normalized_action,
            business_context,
            total_value,
            processing,
        }
    }

    pub fn raw_fields(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn item_id(&self) -> Option<&str> {
        self.get("item_id").and_then(Value::as_str)
    }

    pub fn location_id(&self) -> Option<&str> {
        self.get("location_id").and_then(Value::as_str)
    }

    pub fn action(&self) -> Option<&str> {
        self.get("action").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kafka_meta() -> KafkaMetadata {
        KafkaMetadata {
            topic: "warehouse.inventory".into(),
            partition: 0,
            offset: 0,
            key: None,
        }
    }

    fn raw(value: Value) -> RawEvent {
        RawEvent::from_json(value).unwrap()
    }

    #[test]
    fn stock_out_flips_sign() {
        let event = ProcessedEvent::from_raw(
            raw(json!({
                "item_id": "I1",
                "action": "stock_out",
                "quantity": 10,
                "timestamp": "2024-03-11T10:00:00Z",
            })),
            kafka_meta(),
        );
        assert_eq!(event.quantity_abs, 10.0);
        assert_eq!(event.quantity_normalized, -10.0);
        assert_eq!(event.normalized_action, NormalizedAction::Outbound);
    }

    #[test]
    fn stock_in_keeps_sign_positive() {
        let event = ProcessedEvent::from_raw(
            raw(json!({
                "item_id": "I1",
                "action": "stock_in",
                "quantity": 50,
                "unit_price": 2.0,
                "timestamp": "2024-03-11T10:00:00Z",
            })),
            kafka_meta(),
        );
        assert_eq!(event.quantity_normalized, 50.0);
        assert_eq!(event.total_value, Some(100.0));
        assert_eq!(event.business_context.shift, Shift::Morning);
        assert!(event.business_context.is_business_hours);
    }

    #[test]
    fn epoch_and_iso_timestamps_agree_on_business_context() {
        let from_iso = ProcessedEvent::from_raw(
            raw(json!({
                "item_id": "I1",
                "action": "stock_in",
                "quantity": 1,
                "timestamp": "2024-01-15T10:30:00Z",
            })),
            kafka_meta(),
        );
        let from_epoch = ProcessedEvent::from_raw(
            raw(json!({
                "item_id": "I1",
                "action": "stock_in",
                "quantity": 1,
                "timestamp": 1_705_314_600,
            })),
            kafka_meta(),
        );
        assert_eq!(from_iso.business_context, from_epoch.business_context);
    }

    #[test]
    fn shift_boundaries() {
        let hour_to_shift = |hour: u32, minute: u32| {
            let ts = Utc.with_ymd_and_hms(2024, 3, 11, hour, minute, 0).unwrap();
            BusinessContext::derive(ts).shift
        };
        assert_eq!(hour_to_shift(6, 0), Shift::Morning);
        assert_eq!(hour_to_shift(13, 59), Shift::Morning);
        assert_eq!(hour_to_shift(14, 0), Shift::Afternoon);
        assert_eq!(hour_to_shift(21, 59), Shift::Afternoon);
        assert_eq!(hour_to_shift(22, 0), Shift::Night);
        assert_eq!(hour_to_shift(5, 59), Shift::Night);
    }

    #[test]
    fn unparseable_timestamp_falls_back_to_now() {
        let event = ProcessedEvent::from_raw(
            raw(json!({
                "item_id": "I1",
                "action": "stock_in",
                "quantity": 1,
                "timestamp": "not-a-timestamp",
            })),
            kafka_meta(),
        );
        assert!(event.processing.timestamp_fallback);
    }
}
