//! `PostgreSQL` implementation of the `EventStore` trait.
//!
//! Version heads and the global counter are rows in the same database as the
//! events, read and advanced inside the write transaction. Every write first
//! locks the single `event_store_sequence` row, so writers from any number of
//! processes are serialized and a rolled-back write leaves no trace.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modulith_core::clock::{Clock, SystemClock};
use modulith_core::error::EventStoreError;
use modulith_core::event::{EventMetadata, NewEvent, StoredEvent, StreamKey};
use modulith_core::projection::Projector;
use modulith_core::store::EventStore;
use modulith_core::validate;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::schema::{CREATE_EVENT_STORE_TABLES, EVENT_COLUMNS, INSERT_CHUNK_ROWS};
use crate::writer::{EventWriter, LogHead, Rejection, StreamHeads, final_heads};

/// Maps a driver failure to the store's taxonomy. Data the server can never
/// accept becomes `InvalidArgument`; everything else is `StorageUnavailable`.
/// The transaction, if any, is rolled back when it is dropped.
fn backend_error(error: sqlx::Error) -> EventStoreError {
    let rejected = error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| is_rejected_input(&code));
    if rejected {
        tracing::debug!(%error, "backend rejected event data");
        return EventStoreError::InvalidArgument(error.to_string());
    }
    tracing::warn!(%error, "event store backend failure");
    EventStoreError::StorageUnavailable(error.to_string())
}

/// SQLSTATE classes that retrying cannot fix: data exceptions (22) and
/// program limits such as oversized index rows (54).
fn is_rejected_input(sqlstate: &str) -> bool {
    sqlstate.starts_with("22") || sqlstate.starts_with("54")
}

/// Encodes a JSON document as text for a `JSON` column. Binding through
/// `sqlx::types::Json` would send JSONB, which refuses `\u0000`.
fn json_text(value: &impl serde::Serialize) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// Row shape shared by every read query.
#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: String,
    aggregate_type: String,
    event_type: String,
    payload: Json<serde_json::Value>,
    metadata: Json<EventMetadata>,
    version: i64,
    global_sequence: i64,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            aggregate_type: row.aggregate_type,
            event_type: row.event_type,
            payload: row.payload.0,
            metadata: row.metadata.0,
            version: row.version,
            global_sequence: row.global_sequence,
            occurred_at: row.occurred_at,
        }
    }
}

/// Stream heads and already-used event ids, fetched under the write lock.
#[derive(Debug, Default)]
struct FetchedHeads {
    versions: HashMap<StreamKey, i64>,
    existing_ids: HashSet<Uuid>,
}

impl StreamHeads for FetchedHeads {
    fn head(&self, key: &StreamKey) -> i64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn contains_event(&self, event_id: &Uuid) -> bool {
        self.existing_ids.contains(event_id)
    }
}

/// Why a commit did not happen.
enum CommitFailure {
    Rejected(Rejection),
    Storage(EventStoreError),
}

impl From<sqlx::Error> for CommitFailure {
    fn from(error: sqlx::Error) -> Self {
        Self::Storage(backend_error(error))
    }
}

/// PostgreSQL-backed event store.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    projectors: Vec<Arc<dyn Projector>>,
}

impl PgEventStore {
    /// Creates a new `PgEventStore` stamped by the system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Creates a new `PgEventStore` stamped by `clock`.
    #[must_use]
    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            projectors: Vec::new(),
        }
    }

    /// Registers an inline projector. Projectors run in registration order
    /// inside the write transaction.
    #[must_use]
    pub fn with_projector(mut self, projector: Arc<dyn Projector>) -> Self {
        self.projectors.push(projector);
        self
    }

    /// Applies the schema. Safe to run on every startup.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the DDL cannot be executed.
    #[tracing::instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(CREATE_EVENT_STORE_TABLES)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    /// Locks the global counter row and returns the end of the log.
    async fn lock_log_head(tx: &mut Transaction<'_, Postgres>) -> Result<LogHead, sqlx::Error> {
        let (last_sequence, last_occurred_at): (i64, Option<DateTime<Utc>>) = sqlx::query_as(
            r"
            SELECT last_sequence, last_occurred_at
            FROM event_store_sequence
            WHERE singleton
            FOR UPDATE
            ",
        )
        .fetch_one(&mut **tx)
        .await?;

        Ok(LogHead {
            last_sequence,
            last_occurred_at,
        })
    }

    /// Reads the head of every stream in `events` and the ids already taken.
    async fn fetch_heads(
        tx: &mut Transaction<'_, Postgres>,
        events: &[NewEvent],
    ) -> Result<FetchedHeads, sqlx::Error> {
        let mut heads = FetchedHeads::default();

        for event in events {
            let key = event.stream_key();
            if heads.versions.contains_key(&key) {
                continue;
            }
            let version: Option<i64> = sqlx::query_scalar(
                r"
                SELECT version
                FROM event_streams
                WHERE aggregate_type = $1 AND aggregate_id = $2
                FOR UPDATE
                ",
            )
            .bind(&key.aggregate_type)
            .bind(&key.aggregate_id)
            .fetch_optional(&mut **tx)
            .await?;
            heads.versions.insert(key, version.unwrap_or(0));
        }

        let ids: Vec<Uuid> = events.iter().map(|event| event.event_id).collect();
        let existing: Vec<Uuid> =
            sqlx::query_scalar("SELECT event_id FROM stored_events WHERE event_id = ANY($1)")
                .bind(ids)
                .fetch_all(&mut **tx)
                .await?;
        heads.existing_ids.extend(existing);

        Ok(heads)
    }

    async fn insert_events(
        tx: &mut Transaction<'_, Postgres>,
        staged: &[StoredEvent],
    ) -> Result<(), sqlx::Error> {
        for chunk in staged.chunks(INSERT_CHUNK_ROWS) {
            let documents = chunk
                .iter()
                .map(|event| Ok((json_text(&event.payload)?, json_text(&event.metadata)?)))
                .collect::<Result<Vec<_>, sqlx::Error>>()?;

            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO stored_events (event_id, aggregate_id, aggregate_type, event_type, \
                 payload, metadata, version, global_sequence, occurred_at) ",
            );
            qb.push_values(chunk.iter().zip(documents), |mut b, (event, (payload, metadata))| {
                b.push_bind(event.event_id)
                    .push_bind(&event.aggregate_id)
                    .push_bind(&event.aggregate_type)
                    .push_bind(&event.event_type)
                    .push_bind(payload)
                    .push_unseparated("::json")
                    .push_bind(metadata)
                    .push_unseparated("::json")
                    .push_bind(event.version)
                    .push_bind(event.global_sequence)
                    .push_bind(event.occurred_at);
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn advance_heads(
        tx: &mut Transaction<'_, Postgres>,
        staged: &[StoredEvent],
    ) -> Result<(), sqlx::Error> {
        for (key, version) in final_heads(staged) {
            sqlx::query(
                r"
                INSERT INTO event_streams (aggregate_type, aggregate_id, version)
                VALUES ($1, $2, $3)
                ON CONFLICT (aggregate_type, aggregate_id)
                DO UPDATE SET version = EXCLUDED.version
                ",
            )
            .bind(&key.aggregate_type)
            .bind(&key.aggregate_id)
            .bind(version)
            .execute(&mut **tx)
            .await?;
        }

        if let Some(last) = staged.last() {
            sqlx::query(
                r"
                UPDATE event_store_sequence
                SET last_sequence = $1, last_occurred_at = $2
                WHERE singleton
                ",
            )
            .bind(last.global_sequence)
            .bind(last.occurred_at)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Stages and persists `events` in one transaction.
    async fn commit(&self, events: Vec<NewEvent>) -> Result<Vec<StoredEvent>, CommitFailure> {
        EventWriter::validate_all(&events).map_err(CommitFailure::Rejected)?;

        let mut tx = self.pool.begin().await?;
        let log = Self::lock_log_head(&mut tx).await?;
        let heads = Self::fetch_heads(&mut tx, &events).await?;

        let staged = EventWriter::new(self.clock.as_ref(), &self.projectors)
            .stage(&heads, log, events)
            .map_err(CommitFailure::Rejected)?;

        Self::insert_events(&mut tx, &staged).await?;
        Self::advance_heads(&mut tx, &staged).await?;
        tx.commit().await?;

        Ok(staged)
    }

    async fn fetch_events(
        &self,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows: Vec<EventRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    fn select_events<'a>() -> QueryBuilder<'a, Postgres> {
        QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM stored_events"))
    }

    fn push_stream_filter<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        aggregate_id: &'a str,
        aggregate_type: Option<&'a str>,
    ) {
        qb.push(" WHERE aggregate_id = ").push_bind(aggregate_id);
        if let Some(aggregate_type) = aggregate_type {
            qb.push(" AND aggregate_type = ").push_bind(aggregate_type);
        }
    }
}

impl fmt::Debug for PgEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgEventStore")
            .field("pool", &self.pool)
            .field("projectors", &self.projectors.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[tracing::instrument(
        skip(self, event),
        fields(
            aggregate_type = %event.aggregate_type,
            aggregate_id = %event.aggregate_id,
            event_type = %event.event_type
        )
    )]
    async fn store(&self, event: NewEvent) -> Result<StoredEvent, EventStoreError> {
        let mut committed = self.commit(vec![event]).await.map_err(|failure| match failure {
            CommitFailure::Rejected(rejection) => {
                let error = rejection.into_single();
                tracing::debug!(%error, "event rejected");
                error
            }
            CommitFailure::Storage(error) => error,
        })?;
        committed
            .pop()
            .ok_or_else(|| EventStoreError::StorageUnavailable("commit returned no event".into()))
    }

    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
    async fn store_many(&self, events: Vec<NewEvent>) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let committed = self.commit(events).await.map_err(|failure| match failure {
            CommitFailure::Rejected(rejection) => {
                let error = rejection.into_batch();
                tracing::debug!(%error, "batch rejected");
                error
            }
            CommitFailure::Storage(error) => error,
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
        let mut qb = Self::select_events();
        Self::push_stream_filter(&mut qb, aggregate_id, aggregate_type);
        qb.push(" ORDER BY global_sequence ASC");
        self.fetch_events(&mut qb).await
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
        let mut qb = Self::select_events();
        Self::push_stream_filter(&mut qb, aggregate_id, aggregate_type);
        qb.push(" AND version >= ").push_bind(from_version);
        qb.push(" ORDER BY global_sequence ASC");
        self.fetch_events(&mut qb).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_by_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::require_non_empty("event type", event_type)?;
        let mut qb = Self::select_events();
        qb.push(" WHERE event_type = ").push_bind(event_type);
        qb.push(" ORDER BY global_sequence ASC");
        self.fetch_events(&mut qb).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::date_range(from, to)?;
        let mut qb = Self::select_events();
        qb.push(" WHERE occurred_at >= ").push_bind(from);
        qb.push(" AND occurred_at <= ").push_bind(to);
        qb.push(" ORDER BY occurred_at ASC, global_sequence ASC");
        self.fetch_events(&mut qb).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_aggregate_version(
        &self,
        aggregate_id: &str,
        aggregate_type: Option<&str>,
    ) -> Result<i64, EventStoreError> {
        validate::stream_selector(aggregate_id, aggregate_type)?;
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COALESCE(MAX(version), 0) FROM event_streams");
        Self::push_stream_filter(&mut qb, aggregate_id, aggregate_type);
        let version: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(version)
    }

    async fn get_event_count(&self) -> Result<i64, EventStoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM stored_events")
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_paginated(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate::page(offset, limit)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut qb = Self::select_events();
        qb.push(" ORDER BY global_sequence ASC");
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
        self.fetch_events(&mut qb).await
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<(), EventStoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;
        Self::lock_log_head(&mut tx).await.map_err(backend_error)?;
        sqlx::query("TRUNCATE stored_events, event_streams")
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        sqlx::query(
            "UPDATE event_store_sequence SET last_sequence = 0, last_occurred_at = NULL WHERE singleton",
        )
        .execute(&mut *tx)
        .await
        .map_err(backend_error)?;
        tx.commit().await.map_err(backend_error)?;
        tracing::warn!("event store cleared");
        Ok(())
    }
}
