//! Event value types: what callers submit and what the store persists.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata key for the correlation identifier.
pub const CORRELATION_ID_KEY: &str = "correlationId";
/// Metadata key for the causation identifier.
pub const CAUSATION_ID_KEY: &str = "causationId";
/// Metadata key for the acting principal.
pub const ACTOR_KEY: &str = "actor";

/// Opaque key/value side-channel attached to every event.
pub type EventMetadata = Map<String, Value>;

/// Identifies one aggregate stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    /// Logical category of the aggregate, e.g. `Order`.
    pub aggregate_type: String,
    /// Identifier of the aggregate within its type.
    pub aggregate_id: String,
}

impl StreamKey {
    /// Creates a new `StreamKey`.
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: impl Into<String>) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// The stream version a writer expects to find before appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    /// Append at the tail without checking.
    #[default]
    Any,
    /// The stream must currently be at exactly this version. `Exact(0)`
    /// requires that the stream has no events yet.
    Exact(i64),
}

impl ExpectedVersion {
    /// Expect a stream with no events.
    pub const NO_STREAM: Self = Self::Exact(0);

    /// Returns `true` if `current` satisfies this expectation.
    #[must_use]
    pub fn matches(self, current: i64) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == current,
        }
    }
}

/// An event submitted for persistence. The store assigns `version`,
/// `global_sequence` and `occurred_at` when it commits.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Identifier of the owning stream.
    pub aggregate_id: String,
    /// Logical category of the owning stream.
    pub aggregate_type: String,
    /// Semantic kind of the event.
    pub event_type: String,
    /// Opaque event body.
    pub payload: Value,
    /// Opaque side-channel data.
    pub metadata: EventMetadata,
    /// Optimistic concurrency expectation.
    pub expected_version: ExpectedVersion,
}

impl NewEvent {
    /// Creates an event with a fresh time-ordered id, empty metadata and no
    /// version expectation.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            payload,
            metadata: EventMetadata::new(),
            expected_version: ExpectedVersion::Any,
        }
    }

    /// Builds a `NewEvent` from a typed domain event.
    pub fn from_domain_event<E: DomainEvent>(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event: &E,
    ) -> Self {
        Self::new(aggregate_type, aggregate_id, event.event_type(), event.to_payload())
    }

    /// Sets the optimistic concurrency expectation.
    #[must_use]
    pub fn expecting(mut self, expected_version: ExpectedVersion) -> Self {
        self.expected_version = expected_version;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Records the correlation identifier in metadata.
    #[must_use]
    pub fn with_correlation_id(self, correlation_id: Uuid) -> Self {
        self.with_metadata(CORRELATION_ID_KEY, correlation_id.to_string())
    }

    /// Records the causation identifier in metadata.
    #[must_use]
    pub fn with_causation_id(self, causation_id: Uuid) -> Self {
        self.with_metadata(CAUSATION_ID_KEY, causation_id.to_string())
    }

    /// Records the acting principal in metadata.
    #[must_use]
    pub fn with_actor(self, actor: impl Into<String>) -> Self {
        self.with_metadata(ACTOR_KEY, actor.into())
    }

    /// Returns the stream this event targets.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(&self.aggregate_type, &self.aggregate_id)
    }

    /// Attaches the storage-assigned fields, producing the persisted form.
    #[must_use]
    pub fn into_stored(
        self,
        version: i64,
        global_sequence: i64,
        occurred_at: DateTime<Utc>,
    ) -> StoredEvent {
        StoredEvent {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            event_type: self.event_type,
            payload: self.payload,
            metadata: self.metadata,
            version,
            global_sequence,
            occurred_at,
        }
    }
}

/// Stored representation of a domain event. Immutable once persisted.
///
/// Serializes to the audit record shape consumed downstream:
/// `{eventId, aggregateId, aggregateType, eventType, payload, metadata,
/// version, globalSequence, occurredAt}` with an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Identifier of the owning stream.
    pub aggregate_id: String,
    /// Logical category of the owning stream.
    pub aggregate_type: String,
    /// Semantic kind of the event.
    pub event_type: String,
    /// Opaque event body.
    pub payload: Value,
    /// Opaque side-channel data.
    pub metadata: EventMetadata,
    /// 1-based position within the stream.
    pub version: i64,
    /// Store-wide position.
    pub global_sequence: i64,
    /// Time of persistence.
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Returns the stream this event belongs to.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(&self.aggregate_type, &self.aggregate_id)
    }

    /// Correlation identifier from metadata, if present and well formed.
    #[must_use]
    pub fn correlation_id(&self) -> Option<Uuid> {
        self.metadata_uuid(CORRELATION_ID_KEY)
    }

    /// Causation identifier from metadata, if present and well formed.
    #[must_use]
    pub fn causation_id(&self) -> Option<Uuid> {
        self.metadata_uuid(CAUSATION_ID_KEY)
    }

    /// Acting principal from metadata, if present.
    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        self.metadata.get(ACTOR_KEY).and_then(Value::as_str)
    }

    fn metadata_uuid(&self, key: &str) -> Option<Uuid> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// Trait for typed domain events a collaborator may turn into `NewEvent`s.
pub trait DomainEvent: Send + Sync + fmt::Debug {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> Value;
}
