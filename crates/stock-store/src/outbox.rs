use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, Result, StoreError};

/// Unique identifier for an outbox message.
///
/// Subscribers use it to recognise a redelivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxId(Uuid);

impl OutboxId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a message ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OutboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OutboxId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A domain event recorded in the same unit of work as the state change
/// that produced it, waiting to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Unique identifier for this message.
    pub id: OutboxId,

    /// Commit order. Assigned by the store; 0 until committed.
    pub sequence: i64,

    /// The type of the event (e.g., "DishPrepared").
    pub event_type: String,

    /// The type of aggregate that emitted the event (e.g., "Dish").
    pub aggregate_type: String,

    /// The aggregate that emitted the event.
    pub aggregate_id: AggregateId,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata about the event.
    pub metadata: HashMap<String, serde_json::Value>,

    /// Number of delivery attempts so far.
    pub attempts: u32,

    /// Error reported by the last failed delivery attempt.
    pub last_error: Option<String>,

    /// When the message was successfully delivered.
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Creates a new outbox message builder.
    pub fn builder() -> OutboxMessageBuilder {
        OutboxMessageBuilder::default()
    }

    /// Returns true once the message has been delivered.
    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }

    /// Deserializes the payload into a concrete event type.
    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for constructing outbox messages.
#[derive(Debug, Default)]
pub struct OutboxMessageBuilder {
    id: Option<OutboxId>,
    event_type: Option<String>,
    aggregate_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl OutboxMessageBuilder {
    /// Sets the message ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: OutboxId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the message, failing if a required field is missing.
    pub fn build(self) -> Result<OutboxMessage> {
        Ok(OutboxMessage {
            id: self.id.unwrap_or_default(),
            sequence: 0,
            event_type: self
                .event_type
                .ok_or(StoreError::IncompleteMessage("event_type"))?,
            aggregate_type: self
                .aggregate_type
                .ok_or(StoreError::IncompleteMessage("aggregate_type"))?,
            aggregate_id: self
                .aggregate_id
                .ok_or(StoreError::IncompleteMessage("aggregate_id"))?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self
                .payload
                .ok_or(StoreError::IncompleteMessage("payload"))?,
            metadata: self.metadata,
            attempts: 0,
            last_error: None,
            dispatched_at: None,
        })
    }
}
