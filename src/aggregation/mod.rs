//! Window Aggregator (C5): named sliding windows over enriched events.

pub mod window_aggregator;

pub use window_aggregator::{FiveMinuteSnapshot, Trend, WindowAggregator, WindowName, WindowSnapshot};
