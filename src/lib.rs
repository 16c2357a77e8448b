//! Warehouse inventory event pipeline: event processing, enrichment,
//! anomaly detection, windowed aggregation, storage fan-out and alerting
//! over a Kafka/Redpanda bus.
//!
//! # Example
//!
//! ```no_run
//! use warehouse_pipeline::config::Config;
//! use warehouse_pipeline::context::AppContext;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = AppContext::build(Config::from_env())?;
//! tracing::info!("pipeline context ready, uptime {}s", ctx.uptime_seconds());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_inception)]

/// Process configuration, read from the environment.
pub mod config;

/// Process-wide [`context::AppContext`], built once at startup.
pub mod context;

/// Shared data types flowing through every pipeline stage.
pub mod domain;

/// Enricher (C3): item/location metadata, classification, risk.
pub mod enrichment;

/// Anomaly Detector (C4).
pub mod detection;

/// Window Aggregator (C5).
pub mod aggregation;

/// Storage Manager (C7) and Storage Adapters (C8).
pub mod storage;

/// Alert Manager (C9) and notification channels.
pub mod alerting;

/// Small deterministic helpers shared across stages.
pub mod util;

/// Bus Client (C1) and topic constants.
#[cfg(feature = "kafka")]
pub mod bus;

/// Consumer Worker (C6): generic consumer runtime plus the pipeline and
/// storage-routing processors built on top of it.
#[cfg(feature = "kafka")]
pub mod consumer;

/// HTTP surface (`/health`, `/metrics`).
#[cfg(feature = "service")]
pub mod service;

/// Prometheus metric definitions exported over `/metrics`.
#[cfg(feature = "metrics")]
pub mod metrics;

/// OpenTelemetry integration for distributed tracing.
#[cfg(feature = "telemetry")]
pub mod telemetry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber with default settings
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
