//! Event store database schema.

/// Idempotent DDL for the event store tables. The same file is the first
/// sqlx migration, so `#[sqlx::test]` databases and `PgEventStore::migrate`
/// agree on the schema.
pub const CREATE_EVENT_STORE_TABLES: &str =
    include_str!("../../../migrations/0001_create_event_store.sql");

/// Columns selected for every read, in `EventRow` order.
pub(crate) const EVENT_COLUMNS: &str = "event_id, aggregate_id, aggregate_type, event_type, \
     payload, metadata, version, global_sequence, occurred_at";

/// Rows per multi-row insert, well under the `PostgreSQL` bind limit.
pub(crate) const INSERT_CHUNK_ROWS: usize = 1_000;
