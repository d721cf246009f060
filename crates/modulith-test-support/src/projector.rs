//! `Projector` implementations that record or refuse.

use std::sync::Mutex;

use modulith_core::event::StoredEvent;
use modulith_core::projection::{ProjectionError, Projector};

/// A projector that records every event it is shown.
#[derive(Debug, Default)]
pub struct RecordingProjector {
    seen: Mutex<Vec<StoredEvent>>,
}

impl RecordingProjector {
    /// Create a new, empty recording projector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all events that were projected.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seen(&self) -> Vec<StoredEvent> {
        self.seen.lock().unwrap().clone()
    }
}

impl Projector for RecordingProjector {
    fn name(&self) -> &str {
        "recording"
    }

    fn project(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// A projector that accepts events until it has seen `fail_after` of them,
/// then refuses every further event. Simulates a backend fault partway
/// through a write.
#[derive(Debug)]
pub struct FailingProjector {
    fail_after: usize,
    seen: Mutex<usize>,
}

impl FailingProjector {
    /// Create a projector that refuses the event after the first
    /// `fail_after` ones.
    #[must_use]
    pub fn after(fail_after: usize) -> Self {
        Self {
            fail_after,
            seen: Mutex::new(0),
        }
    }
}

impl Projector for FailingProjector {
    fn name(&self) -> &str {
        "failing"
    }

    fn project(&self, _event: &StoredEvent) -> Result<(), ProjectionError> {
        let mut seen = self.seen.lock().unwrap();
        if *seen >= self.fail_after {
            return Err(ProjectionError::new("failing", "connection reset"));
        }
        *seen += 1;
        Ok(())
    }
}
