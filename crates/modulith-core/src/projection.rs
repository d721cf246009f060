//! Inline projection hook.

use thiserror::Error;

use crate::event::StoredEvent;

/// A projector refused an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("projector {projector} failed: {message}")]
pub struct ProjectionError {
    /// Name of the failing projector.
    pub projector: String,
    /// Failure description.
    pub message: String,
}

impl ProjectionError {
    /// Creates a new `ProjectionError`.
    #[must_use]
    pub fn new(projector: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            projector: projector.into(),
            message: message.into(),
        }
    }
}

/// Hook invoked for every event of a write, in commit order, before the
/// write becomes visible to readers.
///
/// Returning an error rejects the entire write. Events staged before the
/// failing one may already have been shown to projectors; a rejected write
/// is never retracted from them. Projectors run while the engine holds its
/// write lock or transaction, so they must not call back into the store.
pub trait Projector: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Observes one staged event.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError` to veto the write.
    fn project(&self, event: &StoredEvent) -> Result<(), ProjectionError>;
}
