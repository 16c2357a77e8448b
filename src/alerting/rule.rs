//! Alert rule definitions: conditions evaluated against arbitrary input
//! data to synthesize an [`crate::domain::Alert`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::AlertSeverity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Contains,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn matches(&self, data: &Value) -> bool {
        let Some(field_value) = data.get(&self.field) else {
            return false;
        };
        match self.operator {
            Operator::Gt => compare_numeric(field_value, &self.value, |a, b| a > b),
            Operator::Lt => compare_numeric(field_value, &self.value, |a, b| a < b),
            Operator::Eq => field_value == &self.value,
            Operator::Contains => match (field_value.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            Operator::Regex => match (field_value.as_str(), self.value.as_str()) {
                (Some(s), Some(pattern)) => regex::Regex::new(pattern)
                    .map(|re| re.is_match(s))
                    .unwrap_or(false),
                _ => false,
            },
        }
    }
}

fn compare_numeric(a: &Value, b: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Whether a rule's ordered conditions fire on `any` first match (the
/// default, preserving observed upstream behavior) or require `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Any,
    All,
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Any
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub title_template: String,
    pub description_template: String,
    pub severity: AlertSeverity,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl AlertRule {
    /// Evaluates `data` against this rule's conditions under its
    /// `match_mode`, short-circuiting on the first deciding condition.
    pub fn fires(&self, data: &Value) -> bool {
        match self.match_mode {
            MatchMode::Any => self.conditions.iter().any(|c| c.matches(data)),
            MatchMode::All => self.conditions.iter().all(|c| c.matches(data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(mode: MatchMode) -> AlertRule {
        AlertRule {
            id: "high_risk".into(),
            title_template: "High risk event".into(),
            description_template: "{item_id} flagged".into(),
            severity: AlertSeverity::Warning,
            conditions: vec![
                Condition { field: "confidence".into(), operator: Operator::Gt, value: json!(0.8) },
                Condition { field: "item_id".into(), operator: Operator::Eq, value: json!("SPECIAL") },
            ],
            match_mode: mode,
        }
    }

    #[test]
    fn any_mode_fires_on_first_matching_condition() {
        let r = rule(MatchMode::Any);
        assert!(r.fires(&json!({"confidence": 0.9, "item_id": "X"})));
    }

    #[test]
    fn all_mode_requires_every_condition() {
        let r = rule(MatchMode::All);
        assert!(!r.fires(&json!({"confidence": 0.9, "item_id": "X"})));
        assert!(r.fires(&json!({"confidence": 0.9, "item_id": "SPECIAL"})));
    }
}
