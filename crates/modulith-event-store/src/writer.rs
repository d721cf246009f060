//! Staging and validation of writes, shared by every engine.
//!
//! The writer never mutates storage. It turns submitted events into fully
//! stamped `StoredEvent`s against a read-only view of the current heads, so a
//! rejection at any index leaves the store exactly as it was. Engines publish
//! the staged events only after staging succeeded as a whole.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use modulith_core::clock::{Clock, next_occurred_at};
use modulith_core::error::EventStoreError;
use modulith_core::event::{ExpectedVersion, NewEvent, StoredEvent, StreamKey};
use modulith_core::projection::Projector;
use modulith_core::validate;
use uuid::Uuid;

/// The persisted state a write is staged against.
pub(crate) trait StreamHeads {
    /// Current version of `key`, 0 if the stream has no events.
    fn head(&self, key: &StreamKey) -> i64;

    /// Whether an event with `event_id` is already persisted.
    fn contains_event(&self, event_id: &Uuid) -> bool;
}

/// Position of the end of the global log.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LogHead {
    pub(crate) last_sequence: i64,
    pub(crate) last_occurred_at: Option<DateTime<Utc>>,
}

/// A per-event failure, tagged with the event's position in the write.
#[derive(Debug)]
pub(crate) struct Rejection {
    pub(crate) index: usize,
    pub(crate) error: EventStoreError,
}

impl Rejection {
    /// The error reported for a single-event write.
    pub(crate) fn into_single(self) -> EventStoreError {
        self.error
    }

    /// The error reported for a batch write.
    pub(crate) fn into_batch(self) -> EventStoreError {
        EventStoreError::rejected_at(self.index, &self.error)
    }
}

/// Verifies an optimistic concurrency expectation against `current`.
pub(crate) fn check_expected(
    key: &StreamKey,
    expected: ExpectedVersion,
    current: i64,
) -> Result<(), EventStoreError> {
    match expected {
        ExpectedVersion::Exact(expected) if expected != current => {
            Err(EventStoreError::ConcurrencyConflict {
                aggregate_type: key.aggregate_type.clone(),
                aggregate_id: key.aggregate_id.clone(),
                expected,
                actual: current,
            })
        }
        _ => Ok(()),
    }
}

/// Assigns versions, global sequences and timestamps, then runs projectors.
pub(crate) struct EventWriter<'a> {
    clock: &'a dyn Clock,
    projectors: &'a [Arc<dyn Projector>],
}

impl<'a> EventWriter<'a> {
    pub(crate) fn new(clock: &'a dyn Clock, projectors: &'a [Arc<dyn Projector>]) -> Self {
        Self { clock, projectors }
    }

    /// Checks the shape of every event, without consulting storage.
    pub(crate) fn validate_all(events: &[NewEvent]) -> Result<(), Rejection> {
        events.iter().enumerate().try_for_each(|(index, event)| {
            validate::new_event(event).map_err(|error| Rejection { index, error })
        })
    }

    /// Validates and stamps `events` in order, then runs projectors over the
    /// whole batch. Events of the same stream get consecutive versions in
    /// slice order; expected versions are checked against the batch-local
    /// running head.
    pub(crate) fn stage(
        &self,
        heads: &impl StreamHeads,
        log: LogHead,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, Rejection> {
        Self::validate_all(&events)?;

        let mut running: HashMap<StreamKey, i64> = HashMap::new();
        let mut batch_ids = HashSet::with_capacity(events.len());
        let mut sequence = log.last_sequence;
        let mut occurred_at = log.last_occurred_at;
        let mut staged = Vec::with_capacity(events.len());

        for (index, event) in events.into_iter().enumerate() {
            let reject = |error| Rejection { index, error };

            if heads.contains_event(&event.event_id) || !batch_ids.insert(event.event_id) {
                return Err(reject(EventStoreError::InvalidArgument(format!(
                    "event id {} is already in use",
                    event.event_id
                ))));
            }

            let key = event.stream_key();
            let current = running
                .get(&key)
                .copied()
                .unwrap_or_else(|| heads.head(&key));
            check_expected(&key, event.expected_version, current).map_err(reject)?;

            let version = current + 1;
            sequence += 1;
            let stamped = next_occurred_at(self.clock.now(), occurred_at);
            occurred_at = Some(stamped);
            running.insert(key, version);
            staged.push(event.into_stored(version, sequence, stamped));
        }

        self.project(&staged)?;
        Ok(staged)
    }

    fn project(&self, staged: &[StoredEvent]) -> Result<(), Rejection> {
        for (index, event) in staged.iter().enumerate() {
            for projector in self.projectors {
                projector.project(event).map_err(|e| {
                    tracing::debug!(
                        projector = projector.name(),
                        event_id = %event.event_id,
                        "projector rejected event"
                    );
                    Rejection {
                        index,
                        error: EventStoreError::PartialWriteRejected {
                            index,
                            reason: e.to_string(),
                        },
                    }
                })?;
            }
        }
        Ok(())
    }
}

/// Final version of every stream touched by `staged`.
pub(crate) fn final_heads(staged: &[StoredEvent]) -> HashMap<StreamKey, i64> {
    let mut heads = HashMap::new();
    for event in staged {
        heads.insert(event.stream_key(), event.version);
    }
    heads
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use modulith_core::projection::ProjectionError;
    use serde_json::json;

    use super::*;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
        }
    }

    #[derive(Default)]
    struct Heads {
        versions: HashMap<StreamKey, i64>,
        ids: HashSet<Uuid>,
    }

    impl StreamHeads for Heads {
        fn head(&self, key: &StreamKey) -> i64 {
            self.versions.get(key).copied().unwrap_or(0)
        }

        fn contains_event(&self, event_id: &Uuid) -> bool {
            self.ids.contains(event_id)
        }
    }

    struct RejectType(&'static str);

    impl Projector for RejectType {
        fn name(&self) -> &str {
            "reject-type"
        }

        fn project(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
            if event.event_type == self.0 {
                return Err(ProjectionError::new("reject-type", "read model offline"));
            }
            Ok(())
        }
    }

    fn order_event(aggregate_id: &str) -> NewEvent {
        NewEvent::new("Order", aggregate_id, "order.item_added", json!({}))
    }

    #[test]
    fn test_check_expected_reports_conflict_with_both_versions() {
        let key = StreamKey::new("Order", "A");

        assert!(check_expected(&key, ExpectedVersion::Any, 4).is_ok());
        assert!(check_expected(&key, ExpectedVersion::Exact(4), 4).is_ok());

        match check_expected(&key, ExpectedVersion::Exact(2), 4) {
            Err(EventStoreError::ConcurrencyConflict {
                aggregate_type,
                aggregate_id,
                expected,
                actual,
            }) => {
                assert_eq!(aggregate_type, "Order");
                assert_eq!(aggregate_id, "A");
                assert_eq!(expected, 2);
                assert_eq!(actual, 4);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_stage_assigns_versions_per_stream_and_sequences_globally() {
        let mut heads = Heads::default();
        heads.versions.insert(StreamKey::new("Order", "B"), 4);
        let log = LogHead {
            last_sequence: 10,
            last_occurred_at: None,
        };
        let writer = EventWriter::new(&FixedClock, &[]);

        let staged = writer
            .stage(
                &heads,
                log,
                vec![order_event("A"), order_event("B"), order_event("A")],
            )
            .unwrap();

        let shape: Vec<(&str, i64, i64)> = staged
            .iter()
            .map(|e| (e.aggregate_id.as_str(), e.version, e.global_sequence))
            .collect();
        assert_eq!(shape, vec![("A", 1, 11), ("B", 5, 12), ("A", 2, 13)]);
        assert_eq!(final_heads(&staged)[&StreamKey::new("Order", "A")], 2);
    }

    #[test]
    fn test_stage_never_stamps_before_the_log_head() {
        let later = Utc.with_ymd_and_hms(2026, 1, 15, 11, 0, 0).unwrap();
        let log = LogHead {
            last_sequence: 1,
            last_occurred_at: Some(later),
        };
        let writer = EventWriter::new(&FixedClock, &[]);

        let staged = writer
            .stage(&Heads::default(), log, vec![order_event("A")])
            .unwrap();

        assert_eq!(staged[0].occurred_at, later);
    }

    #[test]
    fn test_stage_checks_expected_versions_against_batch_head() {
        let writer = EventWriter::new(&FixedClock, &[]);

        let ok = writer.stage(
            &Heads::default(),
            LogHead::default(),
            vec![
                order_event("A").expecting(ExpectedVersion::NO_STREAM),
                order_event("A").expecting(ExpectedVersion::Exact(1)),
            ],
        );
        assert!(ok.is_ok());

        let rejection = writer
            .stage(
                &Heads::default(),
                LogHead::default(),
                vec![
                    order_event("A").expecting(ExpectedVersion::NO_STREAM),
                    order_event("A").expecting(ExpectedVersion::NO_STREAM),
                ],
            )
            .unwrap_err();
        assert_eq!(rejection.index, 1);
        assert!(matches!(
            rejection.error,
            EventStoreError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_stage_rejects_duplicate_event_ids() {
        let writer = EventWriter::new(&FixedClock, &[]);
        let first = order_event("A");
        let mut second = order_event("B");
        second.event_id = first.event_id;

        let in_batch = writer
            .stage(&Heads::default(), LogHead::default(), vec![first.clone(), second])
            .unwrap_err();
        assert_eq!(in_batch.index, 1);
        assert!(matches!(
            in_batch.into_batch(),
            EventStoreError::PartialWriteRejected { index: 1, .. }
        ));

        let mut heads = Heads::default();
        heads.ids.insert(first.event_id);
        let persisted = writer
            .stage(&heads, LogHead::default(), vec![first])
            .unwrap_err();
        assert!(matches!(
            persisted.into_single(),
            EventStoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_validate_all_reports_first_invalid_index() {
        let events = vec![
            order_event("A"),
            NewEvent::new("Order", "", "order.item_added", json!({})),
            NewEvent::new("", "C", "order.item_added", json!({})),
        ];

        let rejection = EventWriter::validate_all(&events).unwrap_err();

        assert_eq!(rejection.index, 1);
    }

    #[test]
    fn test_projector_failure_rejects_the_batch_at_the_failing_event() {
        let projectors: Vec<Arc<dyn Projector>> = vec![Arc::new(RejectType("order.cancelled"))];
        let writer = EventWriter::new(&FixedClock, &projectors);
        let cancelled = NewEvent::new("Order", "A", "order.cancelled", json!({}));

        let rejection = writer
            .stage(
                &Heads::default(),
                LogHead::default(),
                vec![order_event("A"), cancelled],
            )
            .unwrap_err();

        assert_eq!(rejection.index, 1);
        assert_eq!(
            rejection.into_batch().to_string(),
            "write rejected at event 1: projector reject-type failed: read model offline"
        );
    }
}
