//! Dish service: the command handler for dishes, stock and reviews.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use common::{AggregateId, IngredientId, OrderId};
use stock_store::{IngredientRecord, ReviewRecord, StockStore, StockStoreExt, UnitOfWork};

use crate::aggregate::{Aggregate, drain_to_outbox, outbox_message};
use crate::command::{Command, CommandResult};
use crate::error::DomainError;

use super::{
    AddIngredient, CreateDish, Dish, DishError, DishEvent, DishReview, DishesPreparedEvent,
    FulfillmentEvent, Ingredient, IsAvailable, OrderedDish, Pantry, PostDishReview,
    PrepareDishes, Restock, ReviewRating, availability,
};

/// Outcome of a fulfilled batch: the events now waiting in the outbox.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub order_id: OrderId,

    /// One DishPrepared event per batch line, in request order.
    pub dish_events: Vec<DishEvent>,

    /// The terminal batch event, recorded after the dish events.
    pub completed: DishesPreparedEvent,
}

/// Service for managing dishes and fulfilling dish batches.
///
/// Every command builds one [`UnitOfWork`] and commits it atomically; its
/// events go to the outbox in the same commit.
pub struct DishService<S: StockStore> {
    store: S,
}

impl<S: StockStore> DishService<S> {
    /// Creates a new dish service with the given stock store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying stock store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new ingredient with its opening stock.
    #[tracing::instrument(skip(self))]
    pub async fn add_ingredient(&self, cmd: AddIngredient) -> Result<Ingredient, DomainError> {
        cmd.validate()?;

        let record = IngredientRecord::new(cmd.ingredient_id, cmd.name, cmd.quantity);
        let ingredient = Ingredient::from(record.clone());
        self.store
            .commit(UnitOfWork::new().insert_ingredient(record))
            .await?;

        tracing::info!(ingredient_id = %ingredient.id, "ingredient added");
        Ok(ingredient)
    }

    /// Adds stock to an ingredient and returns its new state.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, cmd: Restock) -> Result<Ingredient, DomainError> {
        cmd.validate()?;

        self.store
            .commit(UnitOfWork::new().restock(cmd.ingredient_id, cmd.amount))
            .await?;

        let record = self
            .store
            .get_ingredient(cmd.ingredient_id)
            .await?
            .ok_or(DishError::IngredientNotFound(cmd.ingredient_id))?;

        tracing::info!(
            ingredient_id = %cmd.ingredient_id,
            amount = cmd.amount,
            quantity_on_hand = record.quantity_on_hand,
            "ingredient restocked"
        );
        Ok(record.into())
    }

    /// Creates a dish. Fails with `IngredientNotFound` if any recipe
    /// ingredient does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn create_dish(&self, cmd: CreateDish) -> Result<CommandResult<Dish>, DomainError> {
        cmd.validate()?;

        let pantry = self
            .load_pantry(cmd.recipe.iter().map(|item| item.ingredient_id))
            .await?;
        let mut dish = Dish::create(cmd.dish_id, cmd.name, cmd.recipe, &pantry)?;

        let events = dish.list_events().to_vec();
        let messages = drain_to_outbox(&mut dish)?;
        self.store
            .commit(
                UnitOfWork::new()
                    .insert_dish(dish.to_record())
                    .record_all(messages),
            )
            .await?;

        tracing::info!(dish_id = %dish.id(), name = dish.name(), "dish created");
        Ok(CommandResult {
            aggregate: dish,
            events,
        })
    }

    /// Prepares every dish of an order, or none of them.
    ///
    /// The batch is gated on availability, each line is prepared in request
    /// order against one pantry, and the stock draws are committed together
    /// with a DishPrepared message per line followed by one DishesPrepared
    /// message. The store re-checks every draw at commit, so a concurrent
    /// batch that took the stock first makes this one fail with `OutOfStock`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, lines = cmd.dishes.len()))]
    pub async fn prepare_dishes(&self, cmd: PrepareDishes) -> Result<PreparedBatch, DomainError> {
        let started = std::time::Instant::now();

        let result = self.fulfill(cmd).await;

        let outcome = if result.is_ok() { "fulfilled" } else { "rejected" };
        metrics::counter!("dish_batches_total", "outcome" => outcome).increment(1);
        metrics::histogram!("dish_batch_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(batch) => {
                tracing::info!(dishes = batch.dish_events.len(), "dish batch fulfilled");
            }
            Err(err) => {
                tracing::warn!(error = %err, kind = ?err.kind(), "dish batch rejected");
            }
        }
        result
    }

    async fn fulfill(&self, cmd: PrepareDishes) -> Result<PreparedBatch, DomainError> {
        cmd.validate()?;

        let (mut dishes, mut pantry) = self.load_batch(&cmd.dishes).await?;

        // Gate
        availability::check(&batch_lines(&dishes, &cmd.dishes)?, &pantry)?;

        // Apply
        let mut dish_events = Vec::with_capacity(cmd.dishes.len());
        let mut messages = Vec::with_capacity(cmd.dishes.len() + 1);
        for ordered in &cmd.dishes {
            let dish = dishes
                .get_mut(&ordered.dish_id)
                .ok_or(DishError::DishNotFound(ordered.dish_id))?;
            dish.prepare(ordered.quantity, &mut pantry)?;
            dish_events.extend(dish.list_events().iter().cloned());
            messages.extend(drain_to_outbox(dish)?);
        }

        let completed = FulfillmentEvent::dishes_prepared(cmd.order_id, cmd.dishes.clone());
        messages.push(outbox_message(
            FulfillmentEvent::AGGREGATE_TYPE,
            cmd.order_id.into(),
            &completed,
        )?);
        for message in &mut messages {
            message.metadata.insert(
                "order_id".to_string(),
                serde_json::Value::String(cmd.order_id.to_string()),
            );
        }

        // Persist
        let work = pantry
            .drawn()
            .fold(UnitOfWork::new(), |work, (ingredient_id, amount)| {
                work.draw(ingredient_id, amount)
            })
            .record_all(messages);
        self.store.commit(work).await?;

        let units: u64 = cmd.dishes.iter().map(|d| u64::from(d.quantity)).sum();
        metrics::counter!("dishes_prepared_total").increment(units);

        let FulfillmentEvent::DishesPrepared(completed) = completed;
        Ok(PreparedBatch {
            order_id: cmd.order_id,
            dish_events,
            completed,
        })
    }

    /// Answers whether the whole batch could be prepared right now.
    #[tracing::instrument(skip(self))]
    pub async fn is_available(&self, query: IsAvailable) -> Result<bool, DomainError> {
        query.validate()?;

        let (dishes, pantry) = self.load_batch(&query.dishes).await?;
        Ok(availability::is_available(
            &batch_lines(&dishes, &query.dishes)?,
            &pantry,
        )?)
    }

    /// Posts a review for an existing dish.
    #[tracing::instrument(skip(self))]
    pub async fn post_review(&self, cmd: PostDishReview) -> Result<DishReview, DomainError> {
        cmd.validate()?;
        let rating = ReviewRating::try_from(cmd.rating)?;

        if !self.store.dish_exists(cmd.dish_id).await? {
            return Err(DishError::DishNotFound(cmd.dish_id).into());
        }

        let review = DishReview {
            id: cmd.review_id,
            dish_id: cmd.dish_id,
            rating,
            description: cmd.description,
            author: cmd.author,
            created_at: Utc::now(),
        };
        self.store
            .commit(UnitOfWork::new().insert_review(ReviewRecord::from(&review)))
            .await?;

        Ok(review)
    }

    /// Loads a dish by ID.
    ///
    /// Returns None if the dish doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_dish(&self, dish_id: AggregateId) -> Result<Option<Dish>, DomainError> {
        let Some(record) = self.store.get_dish(dish_id).await? else {
            return Ok(None);
        };
        let pantry = self.load_pantry(record.ingredient_ids()).await?;
        Ok(Some(Dish::restore(record, &pantry)?))
    }

    /// Loads every dish, oldest first.
    pub async fn list_dishes(&self) -> Result<Vec<Dish>, DomainError> {
        let records = self.store.list_dishes().await?;
        let pantry = self
            .load_pantry(records.iter().flat_map(|record| record.ingredient_ids()))
            .await?;

        records
            .into_iter()
            .map(|record| Dish::restore(record, &pantry).map_err(DomainError::from))
            .collect()
    }

    /// Loads the reviews posted for a dish, oldest first.
    pub async fn list_reviews(&self, dish_id: AggregateId) -> Result<Vec<DishReview>, DomainError> {
        self.store
            .get_reviews_for_dish(dish_id)
            .await?
            .into_iter()
            .map(|record| DishReview::try_from(record).map_err(DomainError::from))
            .collect()
    }

    /// Loads an ingredient by ID.
    pub async fn get_ingredient(
        &self,
        ingredient_id: IngredientId,
    ) -> Result<Option<Ingredient>, DomainError> {
        Ok(self
            .store
            .get_ingredient(ingredient_id)
            .await?
            .map(Ingredient::from))
    }

    async fn load_pantry(
        &self,
        ingredient_ids: impl IntoIterator<Item = IngredientId>,
    ) -> Result<Pantry, DomainError> {
        let mut ids: Vec<IngredientId> = ingredient_ids.into_iter().collect();
        ids.sort();
        ids.dedup();

        let records = self.store.get_ingredients(&ids).await?;
        Ok(Pantry::from_ingredients(
            records.into_iter().map(Ingredient::from),
        ))
    }

    /// Loads every distinct dish of a batch and a pantry covering their
    /// recipes.
    async fn load_batch(
        &self,
        ordered: &[OrderedDish],
    ) -> Result<(HashMap<AggregateId, Dish>, Pantry), DomainError> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for line in ordered {
            if !seen.insert(line.dish_id) {
                continue;
            }
            let record = self
                .store
                .get_dish(line.dish_id)
                .await?
                .ok_or(DishError::DishNotFound(line.dish_id))?;
            records.push(record);
        }

        let pantry = self
            .load_pantry(records.iter().flat_map(|record| record.ingredient_ids()))
            .await?;
        let dishes = records
            .into_iter()
            .map(|record| Dish::restore(record, &pantry).map(|dish| (dish.id(), dish)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok((dishes, pantry))
    }
}

fn batch_lines<'a>(
    dishes: &'a HashMap<AggregateId, Dish>,
    ordered: &[OrderedDish],
) -> Result<Vec<(&'a Dish, u32)>, DishError> {
    ordered
        .iter()
        .map(|line| {
            dishes
                .get(&line.dish_id)
                .map(|dish| (dish, line.quantity))
                .ok_or(DishError::DishNotFound(line.dish_id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dish::RecipeItem;
    use crate::error::ErrorKind;
    use stock_store::InMemoryStockStore;

    async fn service_with_pizza() -> (DishService<InMemoryStockStore>, IngredientId, AggregateId) {
        let service = DishService::new(InMemoryStockStore::new());
        let flour = service
            .add_ingredient(AddIngredient::new("flour", 10))
            .await
            .unwrap();
        let pizza = service
            .create_dish(CreateDish::new("Pizza", vec![RecipeItem::new(flour.id, 4)]))
            .await
            .unwrap();
        (service, flour.id, pizza.aggregate.id())
    }

    async fn flour_left(service: &DishService<InMemoryStockStore>, id: IngredientId) -> u64 {
        service
            .get_ingredient(id)
            .await
            .unwrap()
            .unwrap()
            .quantity_on_hand
    }

    #[tokio::test]
    async fn test_create_dish_records_created_message() {
        let (service, _, pizza) = service_with_pizza().await;

        let outbox = service.store().outbox().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].event_type, "DishCreated");
        assert_eq!(outbox[0].aggregate_id, pizza);

        let dish = service.get_dish(pizza).await.unwrap().unwrap();
        assert_eq!(dish.name(), "Pizza");
        assert_eq!(dish.recipe()[0].ingredient_name, "flour");
    }

    #[tokio::test]
    async fn test_prepare_then_out_of_stock() {
        let (service, flour, pizza) = service_with_pizza().await;
        let order_id = OrderId::new();

        let batch = service
            .prepare_dishes(PrepareDishes::new(
                order_id,
                vec![OrderedDish::new(pizza, 2)],
            ))
            .await
            .unwrap();

        assert_eq!(batch.order_id, order_id);
        assert_eq!(batch.dish_events.len(), 1);
        assert_eq!(flour_left(&service, flour).await, 2);

        let err = service
            .prepare_dishes(PrepareDishes::new(
                OrderId::new(),
                vec![OrderedDish::new(pizza, 1)],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OutOfStock);
        assert_eq!(flour_left(&service, flour).await, 2);
    }

    #[tokio::test]
    async fn test_prepare_unknown_dish() {
        let (service, flour, pizza) = service_with_pizza().await;
        let unknown = AggregateId::new();

        let err = service
            .prepare_dishes(PrepareDishes::new(
                OrderId::new(),
                vec![OrderedDish::new(pizza, 1), OrderedDish::new(unknown, 1)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Dish(DishError::DishNotFound(id)) if id == unknown
        ));
        assert_eq!(flour_left(&service, flour).await, 10);
    }

    #[tokio::test]
    async fn test_restock_clears_shortage() {
        let (service, flour, pizza) = service_with_pizza().await;
        let batch = vec![OrderedDish::new(pizza, 3)];

        assert!(!service
            .is_available(IsAvailable::new(batch.clone()))
            .await
            .unwrap());

        let restocked = service.restock(Restock::new(flour, 2)).await.unwrap();
        assert_eq!(restocked.quantity_on_hand, 12);

        assert!(service
            .is_available(IsAvailable::new(batch.clone()))
            .await
            .unwrap());
        service
            .prepare_dishes(PrepareDishes::new(OrderId::new(), batch))
            .await
            .unwrap();
        assert_eq!(flour_left(&service, flour).await, 0);
    }

    #[tokio::test]
    async fn test_post_and_list_reviews() {
        let (service, _, pizza) = service_with_pizza().await;

        let review = service
            .post_review(PostDishReview::new(pizza, 5, "Crispy crust", "alex"))
            .await
            .unwrap();
        assert_eq!(review.rating.stars(), 5);

        let reviews = service.list_reviews(pizza).await.unwrap();
        assert_eq!(reviews, vec![review]);
    }

    #[tokio::test]
    async fn test_review_errors() {
        let (service, _, pizza) = service_with_pizza().await;

        let err = service
            .post_review(PostDishReview::new(pizza, 6, "?", "alex"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err = service
            .post_review(PostDishReview::new(AggregateId::new(), 3, "ok", "alex"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.list_reviews(pizza).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_rating_checked_before_dish_lookup() {
        let service = DishService::new(InMemoryStockStore::new());

        let err = service
            .post_review(PostDishReview::new(AggregateId::new(), 0, "", "sam"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Dish(DishError::InvalidRating { rating: 0 })
        ));
    }
}
