//! Read-side queries over a ledger snapshot.

use chrono::{DateTime, Utc};
use modulith_core::event::{StoredEvent, StreamKey};

use super::ledger::Ledger;

/// Side-effect-free reads. Arguments are validated by the façade.
pub(crate) struct EventQueryEngine<'a> {
    ledger: &'a Ledger,
}

impl<'a> EventQueryEngine<'a> {
    pub(crate) fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Positions of every event in the selected streams, ascending.
    fn stream_positions(&self, aggregate_id: &str, aggregate_type: Option<&str>) -> Vec<usize> {
        if let Some(aggregate_type) = aggregate_type {
            return self
                .ledger
                .streams
                .get(&StreamKey::new(aggregate_type, aggregate_id))
                .cloned()
                .unwrap_or_default();
        }

        let mut positions: Vec<usize> = self
            .ledger
            .streams
            .iter()
            .filter(|(key, _)| key.aggregate_id == aggregate_id)
            .flat_map(|(_, positions)| positions.iter().copied())
            .collect();
        positions.sort_unstable();
        positions
    }

    pub(crate) fn for_aggregate(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Vec<StoredEvent> {
        self.ledger
            .collect(&self.stream_positions(aggregate_id, aggregate_type))
    }

    pub(crate) fn from_version(
        &self,
        aggregate_id: &str,
        from_version: i64,
        aggregate_type: Option<&str>,
    ) -> Vec<StoredEvent> {
        let mut events = self.for_aggregate(aggregate_id, aggregate_type);
        events.retain(|event| event.version >= from_version);
        events
    }

    pub(crate) fn by_type(&self, event_type: &str) -> Vec<StoredEvent> {
        self.ledger
            .by_type
            .get(event_type)
            .map(|positions| self.ledger.collect(positions))
            .unwrap_or_default()
    }

    /// Binary searches the log, which is sorted by `occurred_at` and then by
    /// `global_sequence`.
    pub(crate) fn by_date_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<StoredEvent> {
        let events = &self.ledger.events;
        let start = events.partition_point(|event| event.occurred_at < from);
        let end = events.partition_point(|event| event.occurred_at <= to);
        events
            .get(start..end.max(start))
            .map(<[StoredEvent]>::to_vec)
            .unwrap_or_default()
    }

    pub(crate) fn count(&self) -> i64 {
        i64::try_from(self.ledger.events.len()).unwrap_or(i64::MAX)
    }

    pub(crate) fn paginated(&self, offset: i64, limit: i64) -> Vec<StoredEvent> {
        let events = &self.ledger.events;
        let start = usize::try_from(offset).map_or(events.len(), |o| o.min(events.len()));
        let take = usize::try_from(limit).unwrap_or(0);
        events[start..].iter().take(take).cloned().collect()
    }

    pub(crate) fn version(&self, aggregate_id: &str, aggregate_type: Option<&str>) -> i64 {
        self.ledger.tracker.lookup(aggregate_id, aggregate_type)
    }

    pub(crate) fn exists(&self, aggregate_id: &str, aggregate_type: Option<&str>) -> bool {
        self.ledger.tracker.exists(aggregate_id, aggregate_type)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use modulith_core::event::NewEvent;
    use serde_json::json;

    use super::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    /// Builds a ledger from `(type, id, event_type, seconds after base)`.
    fn ledger_with(events: &[(&str, &str, &str, i64)]) -> Ledger {
        let mut ledger = Ledger::default();
        let mut heads = std::collections::HashMap::new();
        let staged = events
            .iter()
            .zip(1..)
            .map(|(&(aggregate_type, aggregate_id, event_type, offset), sequence)| {
                let version = heads
                    .entry((aggregate_type, aggregate_id))
                    .and_modify(|v| *v += 1)
                    .or_insert(1);
                NewEvent::new(aggregate_type, aggregate_id, event_type, json!({})).into_stored(
                    *version,
                    sequence,
                    base_time() + Duration::seconds(offset),
                )
            })
            .collect();
        ledger.publish(staged);
        ledger
    }

    #[test]
    fn test_typed_match_excludes_other_types_sharing_the_id() {
        let ledger = ledger_with(&[
            ("Order", "A", "order.placed", 0),
            ("User", "A", "user.registered", 1),
            ("Order", "A", "order.paid", 2),
        ]);
        let engine = EventQueryEngine::new(&ledger);

        let typed = engine.for_aggregate("A", Some("Order"));
        let loose = engine.for_aggregate("A", None);

        assert_eq!(typed.iter().map(|e| e.version).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            loose.iter().map(|e| e.global_sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(engine.version("A", None), 2);
    }

    #[test]
    fn test_from_version_returns_tail_of_stream() {
        let ledger = ledger_with(&[
            ("Order", "A", "order.placed", 0),
            ("Order", "A", "order.item_added", 1),
            ("Order", "A", "order.paid", 2),
        ]);
        let engine = EventQueryEngine::new(&ledger);

        let tail = engine.from_version("A", 2, Some("Order"));

        assert_eq!(tail.iter().map(|e| e.version).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(engine.from_version("A", 0, Some("Order")).len(), 3);
        assert!(engine.from_version("A", 4, Some("Order")).is_empty());
    }

    #[test]
    fn test_by_type_spans_aggregates_in_global_order() {
        let ledger = ledger_with(&[
            ("Order", "A", "order.placed", 0),
            ("Order", "B", "order.placed", 1),
            ("Order", "A", "order.paid", 2),
        ]);
        let engine = EventQueryEngine::new(&ledger);

        let placed = engine.by_type("order.placed");

        assert_eq!(
            placed.iter().map(|e| e.aggregate_id.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert!(engine.by_type("order.refunded").is_empty());
    }

    #[test]
    fn test_date_range_is_inclusive_on_both_ends() {
        let ledger = ledger_with(&[
            ("Order", "A", "order.placed", 0),
            ("Order", "A", "order.item_added", 10),
            ("Order", "B", "order.placed", 10),
            ("Order", "A", "order.paid", 20),
        ]);
        let engine = EventQueryEngine::new(&ledger);

        let window = engine.by_date_range(
            base_time() + Duration::seconds(10),
            base_time() + Duration::seconds(20),
        );

        assert_eq!(
            window.iter().map(|e| e.global_sequence).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert!(
            engine
                .by_date_range(
                    base_time() + Duration::seconds(11),
                    base_time() + Duration::seconds(19)
                )
                .is_empty()
        );
    }

    #[test]
    fn test_paginated_clamps_to_log_bounds() {
        let ledger = ledger_with(&[
            ("Order", "A", "order.placed", 0),
            ("Order", "B", "order.placed", 1),
            ("Order", "C", "order.placed", 2),
        ]);
        let engine = EventQueryEngine::new(&ledger);

        assert_eq!(engine.paginated(1, 10).len(), 2);
        assert_eq!(engine.paginated(0, 2).len(), 2);
        assert!(engine.paginated(0, 0).is_empty());
        assert!(engine.paginated(5, 10).is_empty());
        assert_eq!(engine.count(), 3);
    }
}
