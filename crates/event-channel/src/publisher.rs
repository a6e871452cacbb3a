//! Event publishing.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use stock_store::OutboxMessage;

use crate::subscriber::Subscriber;
use crate::{ChannelError, Result};

/// Destination of dispatched outbox messages.
///
/// `publish` returning Ok means the message is delivered and may be marked
/// as dispatched. An error leaves it pending for the next attempt.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: &OutboxMessage) -> Result<()>;
}

#[async_trait]
impl<P: EventPublisher + ?Sized> EventPublisher for Arc<P> {
    async fn publish(&self, message: &OutboxMessage) -> Result<()> {
        (**self).publish(message).await
    }
}

/// In-process publisher that fans every message out to its subscribers.
///
/// A message counts as delivered only if every subscriber accepted it. On a
/// retry, subscribers that already accepted it see it again.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber.
    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    #[tracing::instrument(skip(self, message), fields(event_type = %message.event_type, message_id = %message.id))]
    async fn publish(&self, message: &OutboxMessage) -> Result<()> {
        let results = join_all(
            self.subscribers
                .iter()
                .map(|subscriber| subscriber.handle(message)),
        )
        .await;

        let failures: Vec<(&'static str, ChannelError)> = self
            .subscribers
            .iter()
            .zip(results)
            .filter_map(|(subscriber, result)| result.err().map(|e| (subscriber.name(), e)))
            .collect();

        match failures.into_iter().next() {
            None => Ok(()),
            Some((subscriber, err)) => {
                tracing::warn!(subscriber, error = %err, "subscriber rejected message");
                Err(ChannelError::Delivery {
                    subscriber,
                    reason: err.to_string(),
                })
            }
        }
    }
}
