//! Mock `EventStore` implementations for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modulith_core::error::EventStoreError;
use modulith_core::event::{NewEvent, StoredEvent};
use modulith_core::store::EventStore;

fn unavailable() -> EventStoreError {
    EventStoreError::StorageUnavailable("connection refused".into())
}

/// An event store that always returns a storage error. Useful for testing
/// error-handling paths of collaborators.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn store(&self, _event: NewEvent) -> Result<StoredEvent, EventStoreError> {
        Err(unavailable())
    }

    async fn store_many(
        &self,
        _events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(unavailable())
    }

    async fn get_events_for_aggregate(
        &self,
        _aggregate_id: &str,
        _aggregate_type: Option<&str>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(unavailable())
    }

    async fn get_events_from_version(
        &self,
        _aggregate_id: &str,
        _from_version: i64,
        _aggregate_type: Option<&str>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(unavailable())
    }

    async fn get_events_by_type(
        &self,
        _event_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(unavailable())
    }

    async fn get_events_by_date_range(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(unavailable())
    }

    async fn get_aggregate_version(
        &self,
        _aggregate_id: &str,
        _aggregate_type: Option<&str>,
    ) -> Result<i64, EventStoreError> {
        Err(unavailable())
    }

    async fn get_event_count(&self) -> Result<i64, EventStoreError> {
        Err(unavailable())
    }

    async fn get_events_paginated(
        &self,
        _offset: i64,
        _limit: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(unavailable())
    }

    async fn clear(&self) -> Result<(), EventStoreError> {
        Err(unavailable())
    }
}
