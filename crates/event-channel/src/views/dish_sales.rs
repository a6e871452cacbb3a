//! Dish sales read model: units prepared per dish and stock consumed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, IngredientId};
use domain::DishEvent;
use stock_store::OutboxMessage;
use tokio::sync::RwLock;

use crate::Result;
use crate::read_model::ReadModel;
use crate::subscriber::{SeenMessages, Subscriber};

/// Sales summary for one dish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishSales {
    pub dish_id: AggregateId,
    /// Known once the `DishCreated` message was received.
    pub name: Option<String>,
    pub units_prepared: u64,
    /// Number of `DishPrepared` messages applied.
    pub preparations: u64,
    pub last_prepared_at: Option<DateTime<Utc>>,
}

impl DishSales {
    fn empty(dish_id: AggregateId) -> Self {
        Self {
            dish_id,
            name: None,
            units_prepared: 0,
            preparations: 0,
            last_prepared_at: None,
        }
    }
}

#[derive(Default)]
struct DishSalesState {
    dishes: HashMap<AggregateId, DishSales>,
    consumed: HashMap<IngredientId, u64>,
    seen: SeenMessages,
}

/// Read model view over dish messages.
///
/// Tracks how many units of each dish were prepared and how much of each
/// ingredient those preparations drew.
#[derive(Clone, Default)]
pub struct DishSalesView {
    state: Arc<RwLock<DishSalesState>>,
}

impl DishSalesView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, dish_id: AggregateId) -> Option<DishSales> {
        self.state.read().await.dishes.get(&dish_id).cloned()
    }

    /// Units prepared of a dish, 0 if none.
    pub async fn units_prepared(&self, dish_id: AggregateId) -> u64 {
        self.state
            .read()
            .await
            .dishes
            .get(&dish_id)
            .map(|d| d.units_prepared)
            .unwrap_or(0)
    }

    /// Total stock drawn from an ingredient by prepared dishes.
    pub async fn consumed(&self, ingredient_id: IngredientId) -> u64 {
        self.state
            .read()
            .await
            .consumed
            .get(&ingredient_id)
            .copied()
            .unwrap_or(0)
    }

    /// Gets top dishes by units prepared.
    pub async fn top_dishes(&self, limit: usize) -> Vec<DishSales> {
        let state = self.state.read().await;
        let mut dishes: Vec<_> = state.dishes.values().cloned().collect();
        dishes.sort_by(|a, b| b.units_prepared.cmp(&a.units_prepared));
        dishes.truncate(limit);
        dishes
    }
}

#[async_trait]
impl Subscriber for DishSalesView {
    fn name(&self) -> &'static str {
        "DishSalesView"
    }

    async fn handle(&self, message: &OutboxMessage) -> Result<()> {
        if message.aggregate_type != "Dish" {
            return Ok(());
        }

        let event: DishEvent = message.decode()?;

        let mut state = self.state.write().await;
        if !state.seen.first_delivery(message.id) {
            return Ok(());
        }

        match event {
            DishEvent::DishCreated(data) => {
                state
                    .dishes
                    .entry(data.dish_id)
                    .or_insert_with(|| DishSales::empty(data.dish_id))
                    .name = Some(data.name);
            }
            DishEvent::DishPrepared(data) => {
                for line in &data.consumed {
                    *state.consumed.entry(line.ingredient_id).or_insert(0) += line.amount;
                }
                let sales = state
                    .dishes
                    .entry(data.dish_id)
                    .or_insert_with(|| DishSales::empty(data.dish_id));
                sales.units_prepared += u64::from(data.quantity);
                sales.preparations += 1;
                sales.last_prepared_at = Some(data.prepared_at);
            }
        }
        Ok(())
    }
}

impl ReadModel for DishSalesView {
    fn name(&self) -> &'static str {
        "DishSalesView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.dishes.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ConsumedIngredient, outbox_message};

    fn dish_message(event: DishEvent) -> OutboxMessage {
        outbox_message("Dish", event.dish_id(), &event).unwrap()
    }

    fn prepared(dish_id: AggregateId, quantity: u32, flour: IngredientId) -> OutboxMessage {
        dish_message(DishEvent::dish_prepared(
            dish_id,
            quantity,
            vec![ConsumedIngredient {
                ingredient_id: flour,
                amount: u64::from(quantity) * 4,
            }],
        ))
    }

    #[tokio::test]
    async fn test_counts_units_per_dish() {
        let view = DishSalesView::new();
        let pizza = AggregateId::new();
        let flour = IngredientId::new();

        view.handle(&dish_message(DishEvent::dish_created(
            pizza,
            "Pizza",
            vec![],
            Utc::now(),
        )))
        .await
        .unwrap();
        view.handle(&prepared(pizza, 2, flour)).await.unwrap();
        view.handle(&prepared(pizza, 1, flour)).await.unwrap();

        let sales = view.get(pizza).await.unwrap();
        assert_eq!(sales.name.as_deref(), Some("Pizza"));
        assert_eq!(sales.units_prepared, 3);
        assert_eq!(sales.preparations, 2);
        assert!(sales.last_prepared_at.is_some());
        assert_eq!(view.consumed(flour).await, 12);
    }

    #[tokio::test]
    async fn test_redelivery_does_not_double_count() {
        let view = DishSalesView::new();
        let pizza = AggregateId::new();
        let flour = IngredientId::new();
        let message = prepared(pizza, 2, flour);

        view.handle(&message).await.unwrap();
        view.handle(&message).await.unwrap();

        assert_eq!(view.units_prepared(pizza).await, 2);
        assert_eq!(view.consumed(flour).await, 8);
    }

    #[tokio::test]
    async fn test_top_dishes() {
        let view = DishSalesView::new();
        let flour = IngredientId::new();
        let pizza = AggregateId::new();
        let bread = AggregateId::new();
        let soup = AggregateId::new();

        view.handle(&prepared(pizza, 5, flour)).await.unwrap();
        view.handle(&prepared(bread, 1, flour)).await.unwrap();
        view.handle(&prepared(soup, 3, flour)).await.unwrap();

        let top = view.top_dishes(2).await;
        assert_eq!(
            top.iter().map(|d| d.dish_id).collect::<Vec<_>>(),
            vec![pizza, soup]
        );
        assert_eq!(ReadModel::count(&view), 3);
        assert_eq!(view.units_prepared(AggregateId::new()).await, 0);
    }
}
