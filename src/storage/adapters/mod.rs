//! Concrete [`crate::storage::StorageAdapter`] implementations, each
//! speaking a backing store's wire protocol directly over `reqwest`.

pub mod search;
pub mod timeseries;
pub mod warehouse;

pub use search::SearchAdapter;
pub use timeseries::TimeSeriesAdapter;
pub use warehouse::WarehouseAdapter;
