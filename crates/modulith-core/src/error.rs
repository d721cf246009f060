//! Event store error types.

use thiserror::Error;

/// Errors returned by every `EventStore` operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    /// Malformed input: empty identifier, negative pagination, inverted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on {aggregate_type} {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// Type of the stream that had the conflict.
        aggregate_type: String,
        /// Identifier of the stream that had the conflict.
        aggregate_id: String,
        /// The version the caller expected.
        expected: i64,
        /// The version actually persisted.
        actual: i64,
    },

    /// A write was rejected in full. Nothing was committed.
    #[error("write rejected at event {index}: {reason}")]
    PartialWriteRejected {
        /// Position of the offending event within the submitted batch.
        index: usize,
        /// Why the event could not be committed.
        reason: String,
    },

    /// Backend I/O failure or timeout.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Reserved for lookups that target a single record. List-style reads
    /// return empty sequences instead.
    #[error("not found: {0}")]
    NotFound(String),
}

impl EventStoreError {
    /// Returns `true` when the caller may retry the same operation, after
    /// refreshing its version expectations for a conflict.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::StorageUnavailable(_)
        )
    }

    /// Wraps a per-event failure as a whole-batch rejection.
    #[must_use]
    pub fn rejected_at(index: usize, cause: &Self) -> Self {
        match cause {
            Self::PartialWriteRejected { reason, .. } => Self::PartialWriteRejected {
                index,
                reason: reason.clone(),
            },
            other => Self::PartialWriteRejected {
                index,
                reason: other.to_string(),
            },
        }
    }
}
