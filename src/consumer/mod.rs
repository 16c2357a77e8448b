//! Consumer Worker (C6): polls an input topic, drives each message
//! through a [`MessageProcessor`], and commits offsets once a batch is
//! fully processed and its outputs confirmed.
//!
//! Two processor kinds are wired against this same generic consumer
//! runtime (`RedpandaConsumer<P>`): [`pipeline_processor::PipelineProcessor`]
//! composes the Event Processor, Enricher, Anomaly Detector and Window
//! Aggregator over one input topic; [`storage_processor::StorageRoutingProcessor`]
//! routes already-processed records straight to the Storage Manager.

pub mod backpressure;
pub mod config;
pub mod consumer;
pub mod dlq;
pub mod error;
pub mod metrics;
pub mod offset_manager;
pub mod pipeline_processor;
pub mod processor;
pub mod retry;
pub mod shutdown;
pub mod storage_processor;

pub use backpressure::{
    AdaptiveBackpressureConfig, AdaptiveBackpressureController, BackpressureController,
};
pub use config::{ConsumerConfig, ConsumerConfigBuilder};
pub use consumer::RedpandaConsumer;
pub use dlq::{DlqConfig, DlqProducer};
pub use error::{ConsumerError, ConsumerResult};
pub use metrics::ConsumerMetrics;
pub use offset_manager::OffsetManager;
pub use pipeline_processor::{spawn_aggregate_reporter, PipelineProcessor, PipelineStages};
pub use processor::MessageProcessor;
pub use retry::{RetryExecutor, RetryPolicy, RetryResult};
pub use shutdown::{ShutdownCoordinator, ShutdownState};
pub use storage_processor::StorageRoutingProcessor;

/// Default consumer configuration for a pipeline worker bound to
/// `group_id` and `topics`.
pub fn default_config(group_id: impl Into<String>, topics: Vec<String>) -> ConsumerConfig {
    ConsumerConfig::builder()
        .brokers("localhost:9092".to_string())
        .group_id(group_id.into())
        .topics(topics)
        .build()
}
