//! Alert Manager (C9): active-alert state, rule evaluation and
//! notification dispatch.

pub mod manager;
pub mod notification;
pub mod rule;

pub use manager::{AlertManager, AlertManagerStats};
pub use notification::NotificationChannel;
pub use rule::{AlertRule, Condition, MatchMode, Operator};
