//! A time-bounded sliding view over recent records, with eviction on insert.
//!
//! This is deliberately distinct from the Anomaly Detector's count-bounded
//! sample window (a plain `VecDeque` capped at `W` entries, owned by that
//! module): the two containers have different eviction rules and the design
//! notes call out that unifying them would blur a real semantic difference.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Ordered `(instant, record)` entries, oldest first. `add` appends then
/// evicts everything older than `timestamp - window_size`.
#[derive(Debug, Clone)]
pub struct TimeWindow<T> {
    window_size: Duration,
    entries: VecDeque<(DateTime<Utc>, T)>,
}

impl<T> TimeWindow<T> {
    pub fn new(window_size: Duration) -> Self {
        Self {
            window_size,
            entries: VecDeque::new(),
        }
    }

    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Appends `(timestamp, record)` then evicts everything with a
    /// timestamp older than `timestamp - window_size`. Maintains the
    /// invariant that the front entry is always the oldest surviving one.
    pub fn add(&mut self, timestamp: DateTime<Utc>, record: T) {
        self.entries.push_back((timestamp, record));
        self.evict_older_than(timestamp - self.window_size);
    }

    fn evict_older_than(&mut self, cutoff: DateTime<Utc>) {
        while let Some((ts, _)) = self.entries.front() {
            if *ts < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Explicit eviction relative to `now`, for use on a periodic tick
    /// independent of new inserts (e.g. when a window has gone quiet).
    pub fn compact_at(&mut self, now: DateTime<Utc>) {
        self.evict_older_than(now - self.window_size);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, record)| record)
    }

    pub fn iter_with_timestamps(&self) -> impl Iterator<Item = &(DateTime<Utc>, T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.front().map(|(ts, _)| *ts)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn evicts_entries_older_than_window_size() {
        let mut window: TimeWindow<i32> = TimeWindow::new(Duration::seconds(60));
        window.add(at(0), 1);
        window.add(at(30), 2);
        window.add(at(90), 3);
        // at(0) is 90s before the latest insert, older than the 60s window.
        let remaining: Vec<_> = window.iter().copied().collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[test]
    fn front_entry_is_always_oldest() {
        let mut window: TimeWindow<i32> = TimeWindow::new(Duration::seconds(60));
        for i in 0..10 {
            window.add(at(i * 10), i as i32);
        }
        assert_eq!(window.oldest_timestamp(), window.iter_with_timestamps().next().map(|(t, _)| *t));
    }

    #[test]
    fn empty_window_has_no_oldest_timestamp() {
        let window: TimeWindow<i32> = TimeWindow::new(Duration::seconds(60));
        assert_eq!(window.oldest_timestamp(), None);
    }
}
