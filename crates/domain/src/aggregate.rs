//! Core aggregate and domain event traits.

use common::AggregateId;
use serde::{Serialize, de::DeserializeOwned};
use stock_store::{OutboxMessage, StoreError};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for the outbox `event_type` column and subscriber routing.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates that stage the events produced by their commands.
///
/// A command method mutates the aggregate and pushes events onto its queue.
/// The caller drains the queue into the unit of work that persists the
/// mutation, so an event is recorded exactly once and never before the
/// change it describes.
pub trait Aggregate: Send + Sync {
    /// The type of events this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;

    /// Returns the events staged since the last drain.
    fn list_events(&self) -> &[Self::Event];

    /// Discards the staged events.
    fn clear_events(&mut self);

    /// Returns the staged events and clears the queue.
    fn take_events(&mut self) -> Vec<Self::Event> {
        let events = self.list_events().to_vec();
        self.clear_events();
        events
    }
}

/// Wraps a domain event in an outbox message.
pub fn outbox_message<E: DomainEvent>(
    aggregate_type: &str,
    aggregate_id: AggregateId,
    event: &E,
) -> Result<OutboxMessage, StoreError> {
    OutboxMessage::builder()
        .aggregate_type(aggregate_type)
        .aggregate_id(aggregate_id)
        .event_type(event.event_type())
        .payload(event)?
        .build()
}

/// Drains an aggregate's staged events into outbox messages.
pub fn drain_to_outbox<A: Aggregate>(aggregate: &mut A) -> Result<Vec<OutboxMessage>, StoreError> {
    let aggregate_id = aggregate.id();
    aggregate
        .take_events()
        .iter()
        .map(|event| outbox_message(A::aggregate_type(), aggregate_id, event))
        .collect()
}
