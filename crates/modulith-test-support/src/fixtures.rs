//! Event fixtures.

use chrono::{DateTime, TimeZone, Utc};
use modulith_core::event::{ExpectedVersion, NewEvent};

/// Fixed timestamp used across tests.
///
/// # Panics
///
/// Never in practice; the literal date is valid.
#[must_use]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// An `Order` event for `aggregate_id` with the given expectation. The
/// payload records `line` so tests can tell events apart.
#[must_use]
pub fn order_event(aggregate_id: &str, line: u32, expected: ExpectedVersion) -> NewEvent {
    NewEvent::new(
        "Order",
        aggregate_id,
        "order.line_added",
        serde_json::json!({ "line": line }),
    )
    .expecting(expected)
}

/// A `User` event for `aggregate_id`, without a version expectation.
#[must_use]
pub fn user_event(aggregate_id: &str, event_type: &str) -> NewEvent {
    NewEvent::new("User", aggregate_id, event_type, serde_json::json!({}))
}
