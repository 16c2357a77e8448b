//! Output of the Anomaly Detector (C4).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub is_anomaly: bool,
    pub confidence: f64,
    pub anomaly_type: String,
    pub severity: Severity,
    pub details: Map<String, Value>,
}

impl AnomalyResult {
    pub fn none() -> Self {
        Self {
            is_anomaly: false,
            confidence: 0.0,
            anomaly_type: "none".to_string(),
            severity: Severity::Low,
            details: Map::new(),
        }
    }

    pub fn new(
        anomaly_type: impl Into<String>,
        confidence: f64,
        severity: Severity,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            is_anomaly: true,
            confidence: confidence.clamp(0.0, 1.0),
            anomaly_type: anomaly_type.into(),
            severity,
            details,
        }
    }

    /// Tie-break order from the detector's contract: highest confidence
    /// first, then severity high > medium > low, then detector declaration
    /// order (preserved by a stable sort over the input slice).
    pub fn most_significant(results: Vec<AnomalyResult>) -> AnomalyResult {
        results
            .into_iter()
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.severity.cmp(&b.severity))
            })
            .unwrap_or_else(AnomalyResult::none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_confidence_among_candidates() {
        let low = AnomalyResult::new("a", 0.5, Severity::High, Map::new());
        let high = AnomalyResult::new("b", 0.9, Severity::Medium, Map::new());
        let winner = AnomalyResult::most_significant(vec![low, high]);
        assert_eq!(winner.anomaly_type, "b");
    }

    #[test]
    fn ties_on_confidence_break_by_severity() {
        let medium = AnomalyResult::new("medium", 0.8, Severity::Medium, Map::new());
        let high = AnomalyResult::new("high", 0.8, Severity::High, Map::new());
        let winner = AnomalyResult::most_significant(vec![medium, high]);
        assert_eq!(winner.anomaly_type, "high");
    }

    #[test]
    fn empty_input_yields_no_anomaly() {
        let winner = AnomalyResult::most_significant(vec![]);
        assert!(!winner.is_anomaly);
        assert_eq!(winner.anomaly_type, "none");
    }
}
