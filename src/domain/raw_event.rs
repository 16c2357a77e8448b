//! The shape of an inbound bus record, before any normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Inventory action as carried on the wire. Unknown actions are rejected at
/// validation time rather than silently passed through, per the inventory
/// payload's invariant that `action` must be one of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryAction {
    StockIn,
    StockOut,
    Adjustment,
    Transfer,
}

impl InventoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryAction::StockIn => "stock_in",
            InventoryAction::StockOut => "stock_out",
            InventoryAction::Adjustment => "adjustment",
            InventoryAction::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stock_in" => Some(InventoryAction::StockIn),
            "stock_out" => Some(InventoryAction::StockOut),
            "adjustment" => Some(InventoryAction::Adjustment),
            "transfer" => Some(InventoryAction::Transfer),
            _ => None,
        }
    }
}

/// Error produced while validating a raw bus payload.
#[derive(Debug, Error)]
pub enum RawEventError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has an unsupported action value")]
    InvalidAction(&'static str),
    #[error("field `{0}` is not numeric")]
    NotNumeric(&'static str),
}

/// A bus record as received, wrapped as a JSON object with typed accessors
/// for the fields the pipeline relies on. Domain fields the pipeline does not
/// know about (`order_id`, `notes`, `user`, ...) stay in the map untouched
/// and are carried through to every downstream stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(Map<String, Value>);

impl RawEvent {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_json(value: Value) -> Result<Self, RawEventError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(RawEventError::NotAnObject),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.get("event_type").and_then(Value::as_str)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.get("correlation_id").and_then(Value::as_str)
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

    pub fn quantity(&self) -> Option<f64> {
        self.get("quantity").and_then(Value::as_f64)
    }

    pub fn unit_price(&self) -> Option<f64> {
        self.get("unit_price").and_then(Value::as_f64)
    }

    pub fn timestamp_raw(&self) -> Option<&Value> {
        self.get("timestamp")
    }

    /// Validates the invariant the inventory payload schema documents:
    /// `item_id`, `action`, `quantity`, `timestamp` present, `action` known,
    /// `quantity` numeric. Only applied to `event_type == "inventory"`
    /// records (or records with no `event_type` at all, treated as inventory
    /// by default since that is the only payload schema the core is
    /// authoritative for).
    pub fn validate_inventory(&self) -> Result<InventoryAction, RawEventError> {
        let item_id = self.item_id().ok_or(RawEventError::MissingField("item_id"))?;
        if item_id.is_empty() {
            return Err(RawEventError::MissingField("item_id"));
        }
        let action_str = self.action().ok_or(RawEventError::MissingField("action"))?;
        let action = InventoryAction::parse(action_str)
            .ok_or(RawEventError::InvalidAction("action"))?;
        if self.get("quantity").is_none() {
            return Err(RawEventError::MissingField("quantity"));
        }
        if self.quantity().is_none() {
            return Err(RawEventError::NotNumeric("quantity"));
        }
        if self.timestamp_raw().is_none() {
            return Err(RawEventError::MissingField("timestamp"));
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(fields: Value) -> RawEvent {
        RawEvent::from_json(fields).unwrap()
    }

    #[test]
    fn validates_well_formed_inventory_event() {
        let event = raw(json!({
            "item_id": "I1",
            "action": "stock_in",
            "quantity": 50,
            "timestamp": "2024-03-11T10:00:00Z",
        }));
        assert_eq!(event.validate_inventory().unwrap(), InventoryAction::StockIn);
    }

    #[test]
    fn rejects_missing_item_id() {
        let event = raw(json!({
            "action": "stock_in",
            "quantity": 50,
            "timestamp": "2024-03-11T10:00:00Z",
        }));
        assert!(matches!(
            event.validate_inventory(),
            Err(RawEventError::MissingField("item_id"))
        ));
    }

    #[test]
    fn rejects_unknown_action() {
        let event = raw(json!({
            "item_id": "I1",
            "action": "teleport",
            "quantity": 50,
            "timestamp": "2024-03-11T10:00:00Z",
        }));
        assert!(matches!(
            event.validate_inventory(),
            Err(RawEventError::InvalidAction("action"))
        ));
    }

    #[test]
    fn rejects_non_numeric_quantity() {
        let event = raw(json!({
            "item_id": "I1",
            "action": "stock_in",
            "quantity": "fifty",
            "timestamp": "2024-03-11T10:00:00Z",
        }));
        assert!(matches!(
            event.validate_inventory(),
            Err(RawEventError::NotNumeric("quantity"))
        ));
    }
}
