//! Output of the Enricher (C3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::processed_event::ProcessedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeCategory {
    Low,
    Medium,
    High,
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCategory {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub event_type: String,
    pub volume_category: VolumeCategory,
    pub value_category: ValueCategory,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: i32,
    pub level: RiskLevel,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalContext {
    pub season: Season,
    pub month: u32,
    pub seasonal_demand: String,
}

/// Output of C3: a [`ProcessedEvent`] plus cached/derived metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    processed: ProcessedEvent,
    pub item_details: Option<Map<String, Value>>,
    pub location_details: Option<Map<String, Value>>,
    pub classification: Classification,
    pub risk_assessment: RiskAssessment,
    pub seasonal_context: SeasonalContext,
}

impl EnrichedEvent {
    pub fn new(
        processed: ProcessedEvent,
        item_details: Option<Map<String, Value>>,
        location_details: Option<Map<String, Value>>,
        classification: Classification,
        risk_assessment: RiskAssessment,
        seasonal_context: SeasonalContext,
    ) -> Self {
        Self {
            processed,
            item_details,
            location_details,
            classification,
            risk_assessment,
            seasonal_context,
        }
    }

    pub fn processed(&self) -> &ProcessedEvent {
        &self.processed
    }

    pub fn item_id(&self) -> Option<&str> {
        self.processed().item_id()
    }

    pub fn location_id(&self) -> Option<&str> {
        self.processed().location_id()
    }

    pub fn action(&self) -> Option<&str> {
        self.processed().action()
    }

    pub fn is_high_value(&self) -> bool {
        self.item_details
            .as_ref()
            .and_then(|d| d.get("high_value"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn supplier(&self) -> Option<&str> {
        self.item_details
            .as_ref()
            .and_then(|d| d.get("supplier"))
            .and_then(Value::as_str)
    }

    pub fn is_after_hours(&self) -> bool {
        !self.processed().business_context.is_business_hours
    }

    pub fn is_weekend(&self) -> bool {
        self.processed().business_context.is_weekend
    }

    pub fn is_bulk(&self) -> bool {
        self.classification.volume_category == VolumeCategory::Bulk
    }
}
