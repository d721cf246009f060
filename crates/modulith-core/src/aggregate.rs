//! Aggregate root abstraction and event-sourced reconstruction.

use crate::error::EventStoreError;
use crate::event::{ExpectedVersion, NewEvent, StoredEvent};
use crate::store::EventStore;

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// Logical category written to every event of this aggregate.
    const AGGREGATE_TYPE: &'static str;

    /// Error raised while applying history.
    type Error: From<EventStoreError>;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Apply a stored event to mutate internal state. Implementations must
    /// advance `version()` to `event.version`.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the payload cannot be interpreted.
    fn apply(&mut self, event: &StoredEvent) -> Result<(), Self::Error>;
}

/// Brings `aggregate` up to date by applying every event after its current
/// version. Starting from a snapshot only replays the tail.
///
/// # Errors
///
/// Propagates store failures and apply failures.
pub async fn rehydrate<A: AggregateRoot>(
    store: &dyn EventStore,
    mut aggregate: A,
) -> Result<A, A::Error> {
    let events = store
        .get_events_from_version(
            aggregate.aggregate_id(),
            aggregate.version() + 1,
            Some(A::AGGREGATE_TYPE),
        )
        .await?;
    for event in &events {
        aggregate.apply(event)?;
    }
    Ok(aggregate)
}

/// Appends `changes` to the aggregate's stream, expecting the stream to still
/// be at `aggregate.version()`. The aggregate type and id of every change are
/// overwritten with the aggregate's own.
///
/// # Errors
///
/// Returns `PartialWriteRejected` if another writer advanced the stream
/// first, or any other `store_many` failure.
pub async fn append_changes<A: AggregateRoot>(
    store: &dyn EventStore,
    aggregate: &A,
    changes: Vec<NewEvent>,
) -> Result<Vec<StoredEvent>, EventStoreError> {
    let base = aggregate.version();
    let batch = changes
        .into_iter()
        .zip(base..)
        .map(|(mut change, expected)| {
            A::AGGREGATE_TYPE.clone_into(&mut change.aggregate_type);
            aggregate.aggregate_id().clone_into(&mut change.aggregate_id);
            change.expecting(ExpectedVersion::Exact(expected))
        })
        .collect();
    store.store_many(batch).await
}
