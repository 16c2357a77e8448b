//! Input/output topic names, carried as constants rather than re-derived
//! per call site (mirrors `TopicConfig` in the system this was distilled
//! from).

pub struct Topics;

impl Topics {
    pub const INVENTORY: &'static str = "warehouse.inventory";
    pub const ORDERS: &'static str = "warehouse.orders";
    pub const SHIPMENTS: &'static str = "warehouse.shipments";
    pub const ALERTS: &'static str = "warehouse.alerts";
    pub const AUDIT: &'static str = "warehouse.audit";
    pub const METRICS: &'static str = "warehouse.metrics";

    pub const PROCESSED_INVENTORY: &'static str = "warehouse.processed.inventory";
    pub const PROCESSED_ORDERS: &'static str = "warehouse.processed.orders";
    pub const PROCESSED_SHIPMENTS: &'static str = "warehouse.processed.shipments";
    pub const AGGREGATED_METRICS: &'static str = "warehouse.aggregated.metrics";

    pub fn input_topics() -> &'static [&'static str] {
        &[
            Self::INVENTORY,
            Self::ORDERS,
            Self::SHIPMENTS,
            Self::ALERTS,
            Self::AUDIT,
            Self::METRICS,
        ]
    }

    /// Topics a storage-routing consumer reads: alerts, every processed
    /// topic, aggregated metrics, and raw metrics.
    pub fn storage_input_topics() -> &'static [&'static str] {
        &[
            Self::ALERTS,
            Self::PROCESSED_INVENTORY,
            Self::PROCESSED_ORDERS,
            Self::PROCESSED_SHIPMENTS,
            Self::AGGREGATED_METRICS,
            Self::METRICS,
        ]
    }

    /// Maps an input topic to the processed-output topic a Consumer Worker
    /// republishes enriched records to.
    pub fn processed_topic_for(input_topic: &str) -> Option<&'static str> {
        match input_topic {
            Self::INVENTORY => Some(Self::PROCESSED_INVENTORY),
            Self::ORDERS => Some(Self::PROCESSED_ORDERS),
            Self::SHIPMENTS => Some(Self::PROCESSED_SHIPMENTS),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_pipeline_input_topic_to_a_processed_topic() {
        assert_eq!(
            Topics::processed_topic_for(Topics::INVENTORY),
            Some(Topics::PROCESSED_INVENTORY)
        );
        assert_eq!(Topics::processed_topic_for(Topics::AUDIT), None);
    }
}
