//! Shared test mocks and utilities for the Modulith event store.

mod clock;
mod fixtures;
mod projector;
mod store;

pub use clock::{FixedClock, SteppingClock};
pub use fixtures::{base_time, order_event, user_event};
pub use projector::{FailingProjector, RecordingProjector};
pub use store::FailingEventStore;
