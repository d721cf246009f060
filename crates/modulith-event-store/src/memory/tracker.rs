//! Per-stream version counters.

use std::collections::HashMap;

use modulith_core::event::StreamKey;

/// Highest persisted version of every stream. Owned by the ledger and only
/// advanced by the writer while it holds the write lock.
#[derive(Debug, Default)]
pub(crate) struct AggregateVersionTracker {
    versions: HashMap<StreamKey, i64>,
}

impl AggregateVersionTracker {
    /// Current version of `key`, 0 if the stream has no events.
    pub(crate) fn current(&self, key: &StreamKey) -> i64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// Highest version among all streams with `aggregate_id`, any type.
    pub(crate) fn current_loose(&self, aggregate_id: &str) -> i64 {
        self.versions
            .iter()
            .filter(|(key, _)| key.aggregate_id == aggregate_id)
            .map(|(_, version)| *version)
            .max()
            .unwrap_or(0)
    }

    /// Version lookup with an optional type, as exposed by the store.
    pub(crate) fn lookup(&self, aggregate_id: &str, aggregate_type: Option<&str>) -> i64 {
        match aggregate_type {
            Some(aggregate_type) => self.current(&StreamKey::new(aggregate_type, aggregate_id)),
            None => self.current_loose(aggregate_id),
        }
    }

    /// Whether any matched stream has at least one event.
    pub(crate) fn exists(&self, aggregate_id: &str, aggregate_type: Option<&str>) -> bool {
        self.lookup(aggregate_id, aggregate_type) > 0
    }

    /// Records `version` as the new head of `key`.
    pub(crate) fn advance(&mut self, key: StreamKey, version: i64) {
        self.versions.insert(key, version);
    }

    /// Forgets every stream.
    pub(crate) fn reset(&mut self) {
        self.versions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stream_is_at_version_zero() {
        let tracker = AggregateVersionTracker::default();

        assert_eq!(tracker.current(&StreamKey::new("Order", "A")), 0);
        assert_eq!(tracker.lookup("A", None), 0);
    }

    #[test]
    fn test_loose_lookup_returns_highest_version_across_types() {
        let mut tracker = AggregateVersionTracker::default();
        tracker.advance(StreamKey::new("Order", "A"), 3);
        tracker.advance(StreamKey::new("User", "A"), 5);
        tracker.advance(StreamKey::new("Order", "B"), 9);

        assert_eq!(tracker.lookup("A", None), 5);
        assert_eq!(tracker.lookup("A", Some("Order")), 3);
        assert_eq!(tracker.lookup("A", Some("Invoice")), 0);
        assert!(tracker.exists("A", None));
        assert!(!tracker.exists("A", Some("Invoice")));
    }

    #[test]
    fn test_reset_forgets_all_streams() {
        let mut tracker = AggregateVersionTracker::default();
        tracker.advance(StreamKey::new("Order", "A"), 3);

        tracker.reset();

        assert_eq!(tracker.lookup("A", Some("Order")), 0);
    }
}
