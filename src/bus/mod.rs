//! Bus Client (C1): a typed wrapper over the message bus.
//!
//! Producers JSON-encode their payload and send with `acks=all` plus
//! bounded-timeout confirmation; consumers are created with manual offset
//! commit so the Consumer Worker (C6) controls exactly when offsets
//! advance. Grounded in the allow-listed `ClientConfig` construction used by
//! the consumer module, generalized into a standalone client rather than
//! being built inline by a single consumer type.

pub mod client;
pub mod topics;

pub use client::{BusClient, BusError};
pub use topics::Topics;
