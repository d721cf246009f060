//! Argument validation shared by every engine.

use chrono::{DateTime, Utc};

use crate::error::EventStoreError;
use crate::event::{ExpectedVersion, NewEvent};

fn invalid(message: impl Into<String>) -> EventStoreError {
    EventStoreError::InvalidArgument(message.into())
}

/// Rejects empty or whitespace-only identifiers, and identifiers containing
/// NUL, which no text column can hold.
///
/// # Errors
///
/// Returns `InvalidArgument` naming `field`.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), EventStoreError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    if value.contains('\0') {
        return Err(invalid(format!("{field} must not contain NUL characters")));
    }
    Ok(())
}

/// Validates the stream selector of a read.
///
/// # Errors
///
/// Returns `InvalidArgument` for an empty id or an explicit empty type.
pub fn stream_selector(
    aggregate_id: &str,
    aggregate_type: Option<&str>,
) -> Result<(), EventStoreError> {
    require_non_empty("aggregate id", aggregate_id)?;
    if let Some(aggregate_type) = aggregate_type {
        require_non_empty("aggregate type", aggregate_type)?;
    }
    Ok(())
}

/// Validates a replay starting point.
///
/// # Errors
///
/// Returns `InvalidArgument` for a negative version.
pub fn from_version(from_version: i64) -> Result<(), EventStoreError> {
    if from_version < 0 {
        return Err(invalid(format!(
            "from version must be non-negative, got {from_version}"
        )));
    }
    Ok(())
}

/// Validates a pagination window.
///
/// # Errors
///
/// Returns `InvalidArgument` for a negative offset or limit.
pub fn page(offset: i64, limit: i64) -> Result<(), EventStoreError> {
    if offset < 0 {
        return Err(invalid(format!("offset must be non-negative, got {offset}")));
    }
    if limit < 0 {
        return Err(invalid(format!("limit must be non-negative, got {limit}")));
    }
    Ok(())
}

/// Validates an inclusive date range.
///
/// # Errors
///
/// Returns `InvalidArgument` when `from` is after `to`.
pub fn date_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), EventStoreError> {
    if from > to {
        return Err(invalid(format!(
            "date range is inverted: {} is after {}",
            from.to_rfc3339(),
            to.to_rfc3339()
        )));
    }
    Ok(())
}

/// Validates an event before it is staged for commit.
///
/// # Errors
///
/// Returns `InvalidArgument` for an empty id, type or event type, or a
/// negative expected version.
pub fn new_event(event: &NewEvent) -> Result<(), EventStoreError> {
    require_non_empty("aggregate id", &event.aggregate_id)?;
    require_non_empty("aggregate type", &event.aggregate_type)?;
    require_non_empty("event type", &event.event_type)?;
    match event.expected_version {
        ExpectedVersion::Exact(expected) if expected < 0 => Err(invalid(format!(
            "expected version must be non-negative, got {expected}"
        ))),
        _ => Ok(()),
    }
}
