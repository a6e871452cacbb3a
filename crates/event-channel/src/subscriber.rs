//! Subscriber trait and redelivery tracking.

use std::collections::HashSet;

use async_trait::async_trait;
use stock_store::{OutboxId, OutboxMessage};

use crate::Result;

/// A consumer of outbox messages.
///
/// Delivery is at-least-once: a message can arrive again after a failed or
/// interrupted dispatch, so handlers must tolerate duplicates. Messages
/// arrive in commit order.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Returns the name of this subscriber.
    fn name(&self) -> &'static str;

    /// Handles a single message.
    async fn handle(&self, message: &OutboxMessage) -> Result<()>;
}

/// Remembers which messages a subscriber has already applied.
#[derive(Debug, Clone, Default)]
pub struct SeenMessages {
    ids: HashSet<OutboxId>,
    duplicates: u64,
}

impl SeenMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivery. Returns false if the message was seen before.
    pub fn first_delivery(&mut self, id: OutboxId) -> bool {
        if self.ids.insert(id) {
            true
        } else {
            self.duplicates += 1;
            false
        }
    }

    /// Number of distinct messages applied.
    pub fn handled(&self) -> usize {
        self.ids.len()
    }

    /// Number of redeliveries ignored.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.duplicates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delivery_then_duplicate() {
        let mut seen = SeenMessages::new();
        let id = OutboxId::new();

        assert!(seen.first_delivery(id));
        assert!(!seen.first_delivery(id));
        assert!(seen.first_delivery(OutboxId::new()));

        assert_eq!(seen.handled(), 2);
        assert_eq!(seen.duplicates(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut seen = SeenMessages::new();
        let id = OutboxId::new();
        seen.first_delivery(id);
        seen.first_delivery(id);

        seen.clear();

        assert_eq!(seen.handled(), 0);
        assert_eq!(seen.duplicates(), 0);
        assert!(seen.first_delivery(id));
    }
}
