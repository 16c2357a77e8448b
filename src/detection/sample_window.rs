//! The Anomaly Detector's count-bounded sample window. Deliberately distinct
//! from the Window Aggregator's time-bounded [`crate::domain::TimeWindow`]:
//! this container evicts by count (`len > W`), not by elapsed time.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::EnrichedEvent;

#[derive(Debug)]
pub struct SampleWindow {
    capacity: usize,
    entries: VecDeque<Arc<EnrichedEvent>>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn push(&mut self, event: Arc<EnrichedEvent>) {
        self.entries.push_back(event);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EnrichedEvent>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose `(action, item_id)` match the given pattern key.
    pub fn matching_pattern<'a>(
        &'a self,
        action: &'a str,
        item_id: &'a str,
    ) -> impl Iterator<Item = &'a Arc<EnrichedEvent>> {
        self.entries.iter().filter(move |e| {
            e.action() == Some(action) && e.item_id() == Some(item_id)
        })
    }

    /// Entries whose `action` matches, regardless of item.
    pub fn matching_action<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a Arc<EnrichedEvent>> {
        self.entries.iter().filter(move |e| e.action() == Some(action))
    }

    /// Entries for `item_id` within the last `duration` relative to `now`.
    pub fn for_item_within<'a>(
        &'a self,
        item_id: &'a str,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> impl Iterator<Item = &'a Arc<EnrichedEvent>> {
        let cutoff = now - duration;
        self.entries
            .iter()
            .filter(move |e| e.item_id() == Some(item_id) && e.processed().timestamp_parsed >= cutoff)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// z-score of `x` against `historical`; `None` if fewer than 3 samples or
/// the population is constant (std == 0).
pub fn z_score(x: f64, historical: &[f64]) -> Option<f64> {
    if historical.len() < 3 {
        return None;
    }
    let (mean, std) = mean_std(historical);
    if std == 0.0 {
        return None;
    }
    Some((x - mean).abs() / std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_score_needs_at_least_three_samples() {
        assert_eq!(z_score(10.0, &[1.0, 2.0]), None);
    }

    #[test]
    fn z_score_is_none_for_constant_population() {
        assert_eq!(z_score(10.0, &[5.0, 5.0, 5.0]), None);
    }
}
