use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    AggregateId, DishRecord, IngredientId, IngredientRecord, OutboxId, OutboxMessage,
    ReviewRecord, Result, StoreError,
    store::{StockStore, UnitOfWork, validate_unit_of_work},
};

#[derive(Debug, Default)]
struct MemoryState {
    ingredients: HashMap<IngredientId, IngredientRecord>,
    dishes: Vec<DishRecord>,
    reviews: Vec<ReviewRecord>,
    outbox: Vec<OutboxMessage>,
    next_sequence: i64,
}

impl MemoryState {
    fn has_dish(&self, id: AggregateId) -> bool {
        self.dishes.iter().any(|dish| dish.id == id)
    }
}

/// In-memory stock store implementation for testing.
///
/// Every commit holds the write lock across validation and application, so
/// units of work are serialized exactly like row locks serialize them in
/// PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory stock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of outbox messages, delivered or not.
    pub async fn outbox_len(&self) -> usize {
        self.state.read().await.outbox.len()
    }

    /// Returns the number of undelivered outbox messages.
    pub async fn pending_count(&self) -> usize {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .filter(|message| !message.is_dispatched())
            .count()
    }

    /// Returns every outbox message in commit order.
    pub async fn outbox(&self) -> Vec<OutboxMessage> {
        self.state.read().await.outbox.clone()
    }

    /// Clears all stored data.
    pub async fn clear(&self) {
        *self.state.write().await = MemoryState::default();
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        validate_unit_of_work(&work)?;
        let net = work.net_adjustments()?;

        let mut state = self.state.write().await;

        let find_ingredient = |id: IngredientId| {
            state
                .ingredients
                .get(&id)
                .or_else(|| work.new_ingredients.iter().find(|i| i.id == id))
        };

        for ingredient in &work.new_ingredients {
            if state.ingredients.contains_key(&ingredient.id) {
                return Err(StoreError::Duplicate {
                    kind: "ingredient",
                    id: ingredient.id.to_string(),
                });
            }
        }

        for dish in &work.new_dishes {
            if state.has_dish(dish.id) {
                return Err(StoreError::Duplicate {
                    kind: "dish",
                    id: dish.id.to_string(),
                });
            }
            if let Some(missing) = dish.ingredient_ids().find(|id| find_ingredient(*id).is_none()) {
                return Err(StoreError::IngredientNotFound(missing));
            }
        }

        for review in &work.new_reviews {
            let dish_known = state.has_dish(review.dish_id)
                || work.new_dishes.iter().any(|dish| dish.id == review.dish_id);
            if !dish_known {
                return Err(StoreError::DishNotFound(review.dish_id));
            }
        }

        for message in &work.messages {
            if state.outbox.iter().any(|stored| stored.id == message.id) {
                return Err(StoreError::Duplicate {
                    kind: "outbox message",
                    id: message.id.to_string(),
                });
            }
        }

        // Evaluate every stock line before writing anything.
        let mut quantities = Vec::with_capacity(net.len());
        for (ingredient_id, adjustment) in &net {
            let available = find_ingredient(*ingredient_id)
                .map(|ingredient| ingredient.quantity_on_hand)
                .ok_or(StoreError::IngredientNotFound(*ingredient_id))?;
            let Some(quantity) = adjustment.apply_to(available) else {
                metrics::counter!("stock_draws_rejected_total").increment(1);
                tracing::debug!(
                    %ingredient_id,
                    requested = adjustment.drawn,
                    available,
                    "stock draw rejected at commit"
                );
                return Err(StoreError::InsufficientStock {
                    ingredient_id: *ingredient_id,
                    requested: adjustment.drawn,
                    available: available.saturating_add(adjustment.restocked),
                });
            };
            quantities.push((*ingredient_id, quantity));
        }

        for ingredient in work.new_ingredients {
            state.ingredients.insert(ingredient.id, ingredient);
        }
        for (ingredient_id, quantity) in quantities {
            if let Some(ingredient) = state.ingredients.get_mut(&ingredient_id) {
                ingredient.quantity_on_hand = quantity;
                ingredient.version += 1;
            }
        }
        state.dishes.extend(work.new_dishes);
        state.reviews.extend(work.new_reviews);
        for mut message in work.messages {
            state.next_sequence += 1;
            message.sequence = state.next_sequence;
            state.outbox.push(message);
        }

        Ok(())
    }

    async fn get_ingredient(&self, id: IngredientId) -> Result<Option<IngredientRecord>> {
        Ok(self.state.read().await.ingredients.get(&id).cloned())
    }

    async fn get_ingredients(&self, ids: &[IngredientId]) -> Result<Vec<IngredientRecord>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.ingredients.get(id).cloned())
            .collect())
    }

    async fn get_dish(&self, id: AggregateId) -> Result<Option<DishRecord>> {
        let state = self.state.read().await;
        Ok(state.dishes.iter().find(|dish| dish.id == id).cloned())
    }

    async fn list_dishes(&self) -> Result<Vec<DishRecord>> {
        Ok(self.state.read().await.dishes.clone())
    }

    async fn get_reviews_for_dish(&self, dish_id: AggregateId) -> Result<Vec<ReviewRecord>> {
        let state = self.state.read().await;
        Ok(state
            .reviews
            .iter()
            .filter(|review| review.dish_id == dish_id)
            .cloned()
            .collect())
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|message| !message.is_dispatched())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_dispatched(&self, ids: &[OutboxId]) -> Result<()> {
        let mut state = self.state.write().await;

        if let Some(missing) = ids
            .iter()
            .find(|id| !state.outbox.iter().any(|message| message.id == **id))
        {
            return Err(StoreError::MessageNotFound(*missing));
        }

        let now = Utc::now();
        for message in state.outbox.iter_mut().filter(|m| ids.contains(&m.id)) {
            if message.dispatched_at.is_none() {
                message.attempts += 1;
                message.last_error = None;
                message.dispatched_at = Some(now);
            }
        }
        Ok(())
    }

    async fn record_dispatch_failure(&self, id: OutboxId, error: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let message = state
            .outbox
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or(StoreError::MessageNotFound(id))?;
        message.attempts += 1;
        message.last_error = Some(error.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecipeLineRecord, store::StockStoreExt};

    fn message(aggregate_id: AggregateId, event_type: &str) -> OutboxMessage {
        OutboxMessage::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Dish")
            .event_type(event_type)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    fn dish(recipe: Vec<RecipeLineRecord>) -> DishRecord {
        DishRecord {
            id: AggregateId::new(),
            name: "Pizza".to_string(),
            recipe,
            created_at: Utc::now(),
        }
    }

    async fn seeded_store(quantity: u64) -> (InMemoryStockStore, IngredientId) {
        let store = InMemoryStockStore::new();
        let flour = IngredientId::new();
        store
            .commit(UnitOfWork::new().insert_ingredient(IngredientRecord::new(
                flour, "flour", quantity,
            )))
            .await
            .unwrap();
        (store, flour)
    }

    #[tokio::test]
    async fn draw_decrements_and_bumps_version() {
        let (store, flour) = seeded_store(10).await;

        store.commit(UnitOfWork::new().draw(flour, 8)).await.unwrap();

        let ingredient = store.get_ingredient(flour).await.unwrap().unwrap();
        assert_eq!(ingredient.quantity_on_hand, 2);
        assert_eq!(ingredient.version, 1);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_and_nothing_is_written() {
        let (store, flour) = seeded_store(10).await;
        let dish_id = AggregateId::new();

        let result = store
            .commit(
                UnitOfWork::new()
                    .draw(flour, 11)
                    .record(message(dish_id, "DishPrepared")),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 11,
                available: 10,
                ..
            })
        ));
        assert_eq!(store.quantity_on_hand(flour).await.unwrap(), Some(10));
        assert_eq!(store.outbox_len().await, 0);
    }

    #[tokio::test]
    async fn failure_on_second_ingredient_rolls_back_the_first() {
        let (store, flour) = seeded_store(10).await;
        let cheese = IngredientId::new();
        store
            .commit(UnitOfWork::new().insert_ingredient(IngredientRecord::new(cheese, "cheese", 1)))
            .await
            .unwrap();

        let result = store
            .commit(UnitOfWork::new().draw(flour, 4).draw(cheese, 2))
            .await;

        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
        assert_eq!(store.quantity_on_hand(flour).await.unwrap(), Some(10));
        assert_eq!(store.quantity_on_hand(cheese).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn draw_on_unknown_ingredient_fails() {
        let store = InMemoryStockStore::new();
        let missing = IngredientId::new();

        let result = store.commit(UnitOfWork::new().draw(missing, 1)).await;

        assert!(matches!(result, Err(StoreError::IngredientNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn dish_requires_known_ingredients() {
        let store = InMemoryStockStore::new();
        let missing = IngredientId::new();
        let record = dish(vec![RecipeLineRecord {
            ingredient_id: missing,
            quantity_per_unit: 1,
        }]);

        let result = store.commit(UnitOfWork::new().insert_dish(record)).await;

        assert!(matches!(result, Err(StoreError::IngredientNotFound(id)) if id == missing));
        assert!(store.list_dishes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dish_and_ingredient_in_one_unit() {
        let store = InMemoryStockStore::new();
        let flour = IngredientId::new();
        let record = dish(vec![RecipeLineRecord {
            ingredient_id: flour,
            quantity_per_unit: 4,
        }]);
        let dish_id = record.id;

        store
            .commit(
                UnitOfWork::new()
                    .insert_ingredient(IngredientRecord::new(flour, "flour", 10))
                    .insert_dish(record),
            )
            .await
            .unwrap();

        let stored = store.get_dish(dish_id).await.unwrap().unwrap();
        assert_eq!(stored.recipe[0].quantity_per_unit, 4);
        assert!(store.dish_exists(dish_id).await.unwrap());
    }

    #[tokio::test]
    async fn review_requires_existing_dish() {
        let store = InMemoryStockStore::new();
        let review = ReviewRecord {
            id: crate::ReviewId::new(),
            dish_id: AggregateId::new(),
            rating: 4,
            description: "Good".to_string(),
            author: "alice".to_string(),
            created_at: Utc::now(),
        };

        let result = store.commit(UnitOfWork::new().insert_review(review)).await;

        assert!(matches!(result, Err(StoreError::DishNotFound(_))));
    }

    #[tokio::test]
    async fn outbox_keeps_commit_order() {
        let store = InMemoryStockStore::new();
        let id = AggregateId::new();

        store
            .commit(
                UnitOfWork::new()
                    .record(message(id, "First"))
                    .record(message(id, "Second")),
            )
            .await
            .unwrap();
        store
            .commit(UnitOfWork::new().record(message(id, "Third")))
            .await
            .unwrap();

        let pending = store.fetch_pending(10).await.unwrap();
        let types: Vec<_> = pending.iter().map(|m| m.event_type.as_str()).collect();
        assert_eq!(types, vec!["First", "Second", "Third"]);
        assert_eq!(
            pending.iter().map(|m| m.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn dispatched_messages_leave_the_pending_set() {
        let store = InMemoryStockStore::new();
        let id = AggregateId::new();
        store
            .commit(
                UnitOfWork::new()
                    .record(message(id, "First"))
                    .record(message(id, "Second")),
            )
            .await
            .unwrap();

        let pending = store.fetch_pending(1).await.unwrap();
        assert_eq!(pending.len(), 1);
        store.mark_dispatched(&[pending[0].id]).await.unwrap();

        let remaining = store.fetch_pending(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].event_type, "Second");
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn failed_dispatch_is_recorded_and_stays_pending() {
        let store = InMemoryStockStore::new();
        let id = AggregateId::new();
        let msg = message(id, "DishPrepared");
        let msg_id = msg.id;
        store.commit(UnitOfWork::new().record(msg)).await.unwrap();

        store
            .record_dispatch_failure(msg_id, "broker down")
            .await
            .unwrap();

        let pending = store.fetch_pending(10).await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("broker down"));
    }

    #[tokio::test]
    async fn mark_unknown_message_fails() {
        let store = InMemoryStockStore::new();
        let result = store.mark_dispatched(&[OutboxId::new()]).await;
        assert!(matches!(result, Err(StoreError::MessageNotFound(_))));
    }
}
