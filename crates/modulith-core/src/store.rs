//! Event store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EventStoreError;
use crate::event::{NewEvent, StoredEvent};

/// The single public surface domain modules use to write and read events.
///
/// Passing `None` as `aggregate_type` is a loose match: every stream whose
/// id equals `aggregate_id` is included, which may span several logical
/// aggregates. Loose reads return events in ascending `global_sequence`, so
/// each constituent stream is still in ascending `version`; loose version
/// lookups return the highest version among the matched streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a single event at the tail of its stream.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for malformed input or a duplicate event id,
    /// `ConcurrencyConflict` when the expected version does not match,
    /// `PartialWriteRejected` when a projector refuses the event, and
    /// `StorageUnavailable` on backend failure.
    async fn store(&self, event: NewEvent) -> Result<StoredEvent, EventStoreError>;

    /// Appends an ordered batch atomically: all events commit or none do.
    /// An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// `PartialWriteRejected` naming the first offending event,
    /// `InvalidArgument` when the backend refuses data it can never store,
    /// or `StorageUnavailable` on backend failure. State is unchanged after
    /// any of them.
    async fn store_many(&self, events: Vec<NewEvent>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Full history of a stream, ascending version.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or type, `StorageUnavailable` on
    /// backend failure.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events of a stream with `version >= from_version`, ascending. A
    /// `from_version` of 0 or 1 returns the whole stream.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or type or a negative version,
    /// `StorageUnavailable` on backend failure.
    async fn get_events_from_version(
        &self,
        aggregate_id: &str,
        from_version: i64,
        aggregate_type: Option<&str>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// All events of one type, ascending `global_sequence`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty type, `StorageUnavailable` on backend
    /// failure.
    async fn get_events_by_type(&self, event_type: &str)
    -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events with `occurred_at` in `[from, to]`, ascending `occurred_at`
    /// then `global_sequence`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `from > to`, `StorageUnavailable` on backend
    /// failure.
    async fn get_events_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Current version of a stream, 0 if it has no events.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or type, `StorageUnavailable` on
    /// backend failure.
    async fn get_aggregate_version(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Result<i64, EventStoreError>;

    /// Whether the stream has at least one event.
    ///
    /// # Errors
    ///
    /// Same as [`EventStore::get_aggregate_version`].
    async fn aggregate_exists(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Result<bool, EventStoreError> {
        Ok(self.get_aggregate_version(aggregate_id, aggregate_type).await? > 0)
    }

    /// Total number of events in the store.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` on backend failure.
    async fn get_event_count(&self) -> Result<i64, EventStoreError>;

    /// A window of the global log, ascending `global_sequence`. A `limit` of
    /// 0 returns an empty sequence.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a negative offset or limit,
    /// `StorageUnavailable` on backend failure.
    async fn get_events_paginated(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Removes every event and resets all versions and the global counter.
    /// Irreversible; intended for test harnesses and full environment resets.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` on backend failure.
    async fn clear(&self) -> Result<(), EventStoreError>;
}
