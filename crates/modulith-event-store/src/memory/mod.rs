//! In-memory implementation of the `EventStore` trait.
//!
//! A single `tokio::sync::RwLock` guards the whole ledger. Writes hold the
//! write lock across staging and publishing, which serializes version and
//! global sequence assignment; reads share the read lock and never block each
//! other.

mod ledger;
mod query;
mod tracker;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modulith_core::clock::{Clock, SystemClock};
use modulith_core::error::EventStoreError;
use modulith_core::event::{NewEvent, StoredEvent};
use modulith_core::projection::Projector;
use modulith_core::store::EventStore;
use modulith_core::validate;
use tokio::sync::RwLock;

use self::ledger::Ledger;
use self::query::EventQueryEngine;
use crate::writer::{EventWriter, Rejection};

/// Thread-safe in-memory event store. Cloning shares the same ledger.
#[derive(Clone)]
pub struct InMemoryEventStore {
    ledger: Arc<RwLock<Ledger>>,
    clock: Arc<dyn Clock>,
    projectors: Vec<Arc<dyn Projector>>,
}

impl InMemoryEventStore {
    /// Creates an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::default())),
            clock,
            projectors: Vec::new(),
        }
    }

    /// Registers an inline projector. Projectors run in registration order.
    #[must_use]
    pub fn with_projector(mut self, projector: Arc<dyn Projector>) -> Self {
        self.projectors.push(projector);
        self
    }

    /// Stages `events` and publishes them under one write lock.
    async fn commit(
        &self,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, Rejection> {
        let mut ledger = self.ledger.write().await;
        let log = ledger.log_head();
        let staged = EventWriter::new(self.clock.as_ref(), &self.projectors).stage(
            &*ledger,
            log,
            events,
        )?;
        ledger.publish(staged.clone());
        drop(ledger);
        Ok(staged)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("projectors", &self.projectors.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(
        skip(self, event),
        fields(
            aggregate_type = %event.aggregate_type,
            aggregate_id = %event.aggregate_id,
            event_type = %event.event_type
        )
    )]
    async fn store(&self, event: NewEvent) -> Result<StoredEvent, EventStoreError> {
        let mut committed = self.commit(vec![event]).await.map_err(|rejection| {
            let error = rejection.into_single();
            tracing::debug!(%error, "event rejected");
            error
        })?;
        let stored = committed.pop().ok_or_else(|| {
            EventStoreError::StorageUnavailable("commit returned no event".into())
        })?;
        tracing::debug!(
            version = stored.version,
            global_sequence = stored.global_sequence,
            "event committed"
        );
        Ok(stored)
    }

    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
    async fn store_many(&self, events: Vec<NewEvent>) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let committed = self.commit(events).await.map_err(|rejection| {
            let error = rejection.into_batch();
            tracing::debug!(%error, "batch rejected");
            error
        })?;
        tracing::debug!(events_appended = committed.len(), "batch committed");
        Ok(committed)
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::stream_selector(aggregate_id, aggregate_type)?;
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).for_aggregate(aggregate_id, aggregate_type))
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_from_version(
        &self,
        aggregate_id: &str,
        from_version: i64,
        aggregate_type: Option<&str>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::stream_selector(aggregate_id, aggregate_type)?;
        validate::from_version(from_version)?;
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).from_version(aggregate_id, from_version, aggregate_type))
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_by_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::require_non_empty("event type", event_type)?;
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).by_type(event_type))
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::date_range(from, to)?;
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).by_date_range(from, to))
    }

    #[tracing::instrument(skip(self))]
    async fn get_aggregate_version(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Result<i64, EventStoreError> {
        validate::stream_selector(aggregate_id, aggregate_type)?;
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).version(aggregate_id, aggregate_type))
    }

    #[tracing::instrument(skip(self))]
    async fn aggregate_exists(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Result<bool, EventStoreError> {
        validate::stream_selector(aggregate_id, aggregate_type)?;
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).exists(aggregate_id, aggregate_type))
    }

    async fn get_event_count(&self) -> Result<i64, EventStoreError> {
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).count())
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_paginated(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::page(offset, limit)?;
        let ledger = self.ledger.read().await;
        Ok(EventQueryEngine::new(&ledger).paginated(offset, limit))
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<(), EventStoreError> {
        let mut ledger = self.ledger.write().await;
        let removed = ledger.events.len();
        ledger.wipe();
        drop(ledger);
        tracing::warn!(removed, "event store cleared");
        Ok(())
    }
}
