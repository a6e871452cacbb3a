//! Prepared orders read model, fed by `DishesPrepared` messages.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{FulfillmentEvent, OrderedDish};
use stock_store::{OutboxId, OutboxMessage};
use tokio::sync::RwLock;

use crate::Result;
use crate::read_model::ReadModel;
use crate::subscriber::{SeenMessages, Subscriber};

/// An order whose dishes were all prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOrder {
    pub order_id: OrderId,
    pub dishes: Vec<OrderedDish>,
    pub prepared_at: DateTime<Utc>,
    /// The outbox message that announced the batch.
    pub message_id: OutboxId,
}

impl PreparedOrder {
    /// Total units across every dish line.
    pub fn total_units(&self) -> u64 {
        self.dishes.iter().map(|d| u64::from(d.quantity)).sum()
    }
}

#[derive(Default)]
struct PreparedOrdersState {
    orders: HashMap<OrderId, PreparedOrder>,
    seen: SeenMessages,
}

/// Orders known to be fulfilled, keyed by order id.
///
/// This is the delivery point a sales or order service would listen on.
/// Redelivered messages are ignored.
#[derive(Clone, Default)]
pub struct PreparedOrdersView {
    state: Arc<RwLock<PreparedOrdersState>>,
}

impl PreparedOrdersView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a `DishesPrepared` message for the order was received.
    pub async fn is_prepared(&self, order_id: OrderId) -> bool {
        self.state.read().await.orders.contains_key(&order_id)
    }

    pub async fn get(&self, order_id: OrderId) -> Option<PreparedOrder> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    /// All prepared orders, oldest first.
    pub async fn all(&self) -> Vec<PreparedOrder> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.prepared_at);
        orders
    }

    /// Number of redelivered messages that were ignored.
    pub async fn duplicates(&self) -> u64 {
        self.state.read().await.seen.duplicates()
    }
}

#[async_trait]
impl Subscriber for PreparedOrdersView {
    fn name(&self) -> &'static str {
        "PreparedOrdersView"
    }

    async fn handle(&self, message: &OutboxMessage) -> Result<()> {
        if message.event_type != "DishesPrepared" {
            return Ok(());
        }

        let FulfillmentEvent::DishesPrepared(event) = message.decode()?;

        let mut state = self.state.write().await;
        if !state.seen.first_delivery(message.id) {
            tracing::debug!(message_id = %message.id, "ignoring redelivered batch");
            return Ok(());
        }

        state.orders.insert(
            event.order_id,
            PreparedOrder {
                order_id: event.order_id,
                dishes: event.dishes,
                prepared_at: event.prepared_at,
                message_id: message.id,
            },
        );
        Ok(())
    }
}

impl ReadModel for PreparedOrdersView {
    fn name(&self) -> &'static str {
        "PreparedOrdersView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::{DishEvent, outbox_message};

    fn batch_message(order_id: OrderId, dishes: Vec<OrderedDish>) -> OutboxMessage {
        outbox_message(
            FulfillmentEvent::AGGREGATE_TYPE,
            order_id.into(),
            &FulfillmentEvent::dishes_prepared(order_id, dishes),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_records_prepared_order() {
        let view = PreparedOrdersView::new();
        let order_id = OrderId::new();
        let pizza = AggregateId::new();

        view.handle(&batch_message(
            order_id,
            vec![OrderedDish::new(pizza, 2), OrderedDish::new(pizza, 1)],
        ))
        .await
        .unwrap();

        assert!(view.is_prepared(order_id).await);
        let order = view.get(order_id).await.unwrap();
        assert_eq!(order.total_units(), 3);
        assert_eq!(ReadModel::count(&view), 1);
    }

    #[tokio::test]
    async fn test_redelivery_is_ignored() {
        let view = PreparedOrdersView::new();
        let message = batch_message(OrderId::new(), vec![]);

        view.handle(&message).await.unwrap();
        view.handle(&message).await.unwrap();

        assert_eq!(view.all().await.len(), 1);
        assert_eq!(view.duplicates().await, 1);
    }

    #[tokio::test]
    async fn test_ignores_dish_events() {
        let view = PreparedOrdersView::new();
        let dish_id = AggregateId::new();
        let message =
            outbox_message("Dish", dish_id, &DishEvent::dish_prepared(dish_id, 1, vec![]))
                .unwrap();

        view.handle(&message).await.unwrap();

        assert_eq!(ReadModel::count(&view), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_error() {
        let view = PreparedOrdersView::new();
        let message = OutboxMessage::builder()
            .event_type("DishesPrepared")
            .aggregate_type("Order")
            .aggregate_id(AggregateId::new())
            .payload_raw(serde_json::json!({"type": "DishesPrepared", "data": 7}))
            .build()
            .unwrap();

        assert!(view.handle(&message).await.is_err());
        assert_eq!(view.duplicates().await, 0);

        let retried = batch_message(OrderId::new(), vec![]);
        view.handle(&retried).await.unwrap();
        assert_eq!(view.all().await.len(), 1);
    }
}
