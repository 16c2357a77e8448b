//! Pluggable item/location metadata lookup.
//!
//! A real deployment wires this to whatever backs the shared L2 cache
//! (Redis, a catalog service, ...). Tests and environments with no backend
//! configured use [`NullMetadataProvider`], which always misses and lets the
//! Enricher fall back to its deterministic stand-in.

use serde_json::Map;
use serde_json::Value;

/// Source of item/location metadata consulted after an L1 cache miss.
pub trait MetadataProvider: Send + Sync {
    fn fetch_item(&self, item_id: &str) -> Option<Map<String, Value>>;
    fn fetch_location(&self, location_id: &str) -> Option<Map<String, Value>>;
}

/// Always misses. The Enricher's stand-in formulas then apply.
#[derive(Debug, Default)]
pub struct NullMetadataProvider;

impl MetadataProvider for NullMetadataProvider {
    fn fetch_item(&self, _item_id: &str) -> Option<Map<String, Value>> {
        None
    }

    fn fetch_location(&self, _location_id: &str) -> Option<Map<String, Value>> {
        None
    }
}
