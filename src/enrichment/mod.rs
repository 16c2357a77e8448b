//! Enricher (C3): attaches item/location metadata, classifies the event,
//! and computes risk/seasonal context.
//!
//! Metadata lookup is a pluggable [`MetadataProvider`] behind an L1
//! in-process cache; when no provider is configured (or the provider
//! misses), a deterministic stand-in reproduces the hash-derived metadata
//! the system being replaced fabricates when its own backend is absent.

pub mod enricher;
pub mod provider;

pub use enricher::Enricher;
pub use provider::{MetadataProvider, NullMetadataProvider};
