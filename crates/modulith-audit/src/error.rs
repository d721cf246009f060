//! Audit export error types.

use modulith_core::error::EventStoreError;
use thiserror::Error;

/// Startup and runtime errors for the export binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The event store refused a read.
    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),

    /// An event could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing the export failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}
