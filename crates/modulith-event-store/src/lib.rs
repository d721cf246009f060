//! Modulith event store engines.
//!
//! [`InMemoryEventStore`] keeps the ledger in process and suits tests and
//! single-instance deployments. [`PgEventStore`] keeps events, stream heads
//! and the global counter in `PostgreSQL`, so several application instances
//! can share one ledger.

mod writer;

pub mod memory;
pub mod pg_event_store;
pub mod schema;

pub use memory::InMemoryEventStore;
pub use pg_event_store::PgEventStore;
