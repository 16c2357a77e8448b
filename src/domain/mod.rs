//! Core data types shared by every stage of the processing pipeline.
//!
//! Records flow through the pipeline as JSON-serializable structured maps,
//! gaining typed fields at each stage (`RawEvent` -> `ProcessedEvent` ->
//! `EnrichedEvent`) while always retaining the original payload fields for
//! pass-through and re-serialization.

pub mod alert;
pub mod anomaly;
pub mod enriched_event;
pub mod processed_event;
pub mod raw_event;
pub mod time_window;

pub use alert::{Alert, AlertSeverity, AlertStatus};
pub use anomaly::AnomalyResult;
pub use enriched_event::{Classification, EnrichedEvent, RiskAssessment, SeasonalContext};
pub use processed_event::{BusinessContext, KafkaMetadata, ProcessedEvent, ProcessingMeta, Shift};
pub use raw_event::{InventoryAction, RawEvent};
pub use time_window::TimeWindow;
