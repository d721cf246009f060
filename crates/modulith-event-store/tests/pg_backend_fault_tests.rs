//! `PgEventStore` against a server that cannot be reached. No database needed.

use std::time::Duration;

use modulith_core::error::EventStoreError;
use modulith_core::event::ExpectedVersion;
use modulith_core::store::EventStore;
use modulith_event_store::PgEventStore;
use modulith_test_support::{base_time, order_event};
use sqlx::postgres::PgPoolOptions;

fn unreachable_store() -> PgEventStore {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://modulith@127.0.0.1:1/none")
        .unwrap();
    PgEventStore::new(pool)
}

fn assert_unavailable<T: std::fmt::Debug>(result: Result<T, EventStoreError>) {
    match result {
        Err(error @ EventStoreError::StorageUnavailable(_)) => assert!(error.is_retryable()),
        other => panic!("expected StorageUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_writes_surface_storage_unavailable() {
    let store = unreachable_store();

    assert_unavailable(store.store(order_event("A", 1, ExpectedVersion::Any)).await);
    assert_unavailable(
        store
            .store_many(vec![
                order_event("A", 1, ExpectedVersion::Any),
                order_event("B", 1, ExpectedVersion::Any),
            ])
            .await,
    );
}

#[tokio::test]
async fn test_reads_surface_storage_unavailable() {
    let store = unreachable_store();

    assert_unavailable(store.get_events_for_aggregate("A", None).await);
    assert_unavailable(store.get_events_by_date_range(base_time(), base_time()).await);
    assert_unavailable(store.get_aggregate_version("A", Some("Order")).await);
    assert_unavailable(store.get_event_count().await);
    assert_unavailable(store.get_events_paginated(0, 10).await);
}

#[tokio::test]
async fn test_clear_and_migrate_surface_storage_unavailable() {
    let store = unreachable_store();

    assert_unavailable(store.clear().await);
    assert_unavailable(store.migrate().await);
}

#[tokio::test]
async fn test_invalid_arguments_are_reported_before_touching_the_pool() {
    let store = unreachable_store();

    assert!(matches!(
        store.get_events_from_version("A", -1, None).await,
        Err(EventStoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.store_many(vec![order_event("", 1, ExpectedVersion::Any)]).await,
        Err(EventStoreError::PartialWriteRejected { index: 0, .. })
    ));
    assert!(store.get_events_paginated(0, 0).await.unwrap().is_empty());
}
