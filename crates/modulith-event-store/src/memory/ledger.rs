//! The in-memory log and its indexes.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use modulith_core::event::{StoredEvent, StreamKey};
use uuid::Uuid;

use super::tracker::AggregateVersionTracker;
use crate::writer::{LogHead, StreamHeads};

/// All persisted state of an `InMemoryEventStore`.
///
/// `events` is ordered by `global_sequence`, and because timestamps never go
/// backwards it is ordered by `occurred_at` as well. The index vectors hold
/// positions into `events` in ascending order.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pub(crate) events: Vec<StoredEvent>,
    pub(crate) streams: HashMap<StreamKey, Vec<usize>>,
    pub(crate) by_type: HashMap<String, Vec<usize>>,
    pub(crate) event_ids: HashSet<Uuid>,
    pub(crate) tracker: AggregateVersionTracker,
    pub(crate) last_sequence: i64,
    pub(crate) last_occurred_at: Option<DateTime<Utc>>,
}

impl Ledger {
    pub(crate) fn log_head(&self) -> LogHead {
        LogHead {
            last_sequence: self.last_sequence,
            last_occurred_at: self.last_occurred_at,
        }
    }

    /// Appends staged events. Callers have already validated them against
    /// this ledger under the same write lock.
    pub(crate) fn publish(&mut self, staged: Vec<StoredEvent>) {
        for event in staged {
            let position = self.events.len();
            let key = event.stream_key();
            self.tracker.advance(key.clone(), event.version);
            self.streams.entry(key).or_default().push(position);
            self.by_type
                .entry(event.event_type.clone())
                .or_default()
                .push(position);
            self.event_ids.insert(event.event_id);
            self.last_sequence = event.global_sequence;
            self.last_occurred_at = Some(event.occurred_at);
            self.events.push(event);
        }
    }

    /// Drops every event and resets all counters.
    pub(crate) fn wipe(&mut self) {
        self.events.clear();
        self.streams.clear();
        self.by_type.clear();
        self.event_ids.clear();
        self.tracker.reset();
        self.last_sequence = 0;
        self.last_occurred_at = None;
    }

    /// Clones the events at `positions`.
    pub(crate) fn collect(&self, positions: &[usize]) -> Vec<StoredEvent> {
        positions
            .iter()
            .filter_map(|&position| self.events.get(position))
            .cloned()
            .collect()
    }
}

impl StreamHeads for Ledger {
    fn head(&self, key: &StreamKey) -> i64 {
        self.tracker.current(key)
    }

    fn contains_event(&self, event_id: &Uuid) -> bool {
        self.event_ids.contains(event_id)
    }
}
