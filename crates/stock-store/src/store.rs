use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use crate::{
    AggregateId, DishRecord, IngredientId, IngredientRecord, OutboxId, OutboxMessage,
    ReviewRecord, Result, StoreError,
};

/// A change to an ingredient's quantity on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAdjustment {
    /// Take stock away. Fails the unit of work if it would go below zero.
    Draw {
        ingredient_id: IngredientId,
        amount: u64,
    },

    /// Add stock.
    Restock {
        ingredient_id: IngredientId,
        amount: u64,
    },
}

impl StockAdjustment {
    /// Returns the ingredient this adjustment targets.
    pub fn ingredient_id(&self) -> IngredientId {
        match self {
            StockAdjustment::Draw { ingredient_id, .. }
            | StockAdjustment::Restock { ingredient_id, .. } => *ingredient_id,
        }
    }

    /// Returns the amount moved.
    pub fn amount(&self) -> u64 {
        match self {
            StockAdjustment::Draw { amount, .. } | StockAdjustment::Restock { amount, .. } => {
                *amount
            }
        }
    }
}

/// Net effect of every adjustment on a single ingredient.
///
/// The store applies `quantity + restocked - drawn` only when
/// `quantity + restocked >= drawn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetAdjustment {
    pub drawn: u64,
    pub restocked: u64,
}

impl NetAdjustment {
    /// Applies the adjustment to `available`, returning None if it would go
    /// below zero.
    pub fn apply_to(&self, available: u64) -> Option<u64> {
        available
            .checked_add(self.restocked)
            .and_then(|total| total.checked_sub(self.drawn))
    }
}

/// Everything one command wants to persist, committed all-or-nothing.
///
/// Outbox messages are committed in insertion order, after the state changes
/// they describe.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub new_ingredients: Vec<IngredientRecord>,
    pub adjustments: Vec<StockAdjustment>,
    pub new_dishes: Vec<DishRecord>,
    pub new_reviews: Vec<ReviewRecord>,
    pub messages: Vec<OutboxMessage>,
}

impl UnitOfWork {
    /// Creates an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new ingredient.
    pub fn insert_ingredient(mut self, ingredient: IngredientRecord) -> Self {
        self.new_ingredients.push(ingredient);
        self
    }

    /// Draws stock from an ingredient.
    pub fn draw(mut self, ingredient_id: IngredientId, amount: u64) -> Self {
        self.adjustments.push(StockAdjustment::Draw {
            ingredient_id,
            amount,
        });
        self
    }

    /// Adds stock to an ingredient.
    pub fn restock(mut self, ingredient_id: IngredientId, amount: u64) -> Self {
        self.adjustments.push(StockAdjustment::Restock {
            ingredient_id,
            amount,
        });
        self
    }

    /// Registers a new dish.
    pub fn insert_dish(mut self, dish: DishRecord) -> Self {
        self.new_dishes.push(dish);
        self
    }

    /// Stores a review.
    pub fn insert_review(mut self, review: ReviewRecord) -> Self {
        self.new_reviews.push(review);
        self
    }

    /// Records an outbox message.
    pub fn record(mut self, message: OutboxMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Records several outbox messages, keeping their order.
    pub fn record_all(mut self, messages: impl IntoIterator<Item = OutboxMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Returns true if there is nothing to persist.
    pub fn is_empty(&self) -> bool {
        self.new_ingredients.is_empty()
            && self.adjustments.is_empty()
            && self.new_dishes.is_empty()
            && self.new_reviews.is_empty()
            && self.messages.is_empty()
    }

    /// Folds the adjustments into one net change per ingredient.
    ///
    /// The map is ordered by ingredient id so every store locks rows in the
    /// same order.
    pub fn net_adjustments(&self) -> Result<BTreeMap<IngredientId, NetAdjustment>> {
        let mut net: BTreeMap<IngredientId, NetAdjustment> = BTreeMap::new();
        for adjustment in &self.adjustments {
            let entry = net.entry(adjustment.ingredient_id()).or_default();
            let slot = match adjustment {
                StockAdjustment::Draw { .. } => &mut entry.drawn,
                StockAdjustment::Restock { .. } => &mut entry.restocked,
            };
            *slot = slot.checked_add(adjustment.amount()).ok_or_else(|| {
                StoreError::InvalidUnitOfWork(format!(
                    "adjustment overflow for ingredient {}",
                    adjustment.ingredient_id()
                ))
            })?;
        }
        Ok(net)
    }
}

/// Core trait for stock store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Commits a unit of work atomically - either everything is persisted or
    /// nothing is.
    ///
    /// Every draw is re-evaluated against the stock on hand at commit time;
    /// if any ingredient would go below zero the call fails with
    /// `InsufficientStock` and nothing is written.
    async fn commit(&self, work: UnitOfWork) -> Result<()>;

    /// Retrieves an ingredient.
    async fn get_ingredient(&self, id: IngredientId) -> Result<Option<IngredientRecord>>;

    /// Retrieves every ingredient in `ids` that exists.
    async fn get_ingredients(&self, ids: &[IngredientId]) -> Result<Vec<IngredientRecord>>;

    /// Retrieves a dish with its recipe.
    async fn get_dish(&self, id: AggregateId) -> Result<Option<DishRecord>>;

    /// Retrieves all dishes, oldest first.
    async fn list_dishes(&self) -> Result<Vec<DishRecord>>;

    /// Retrieves the reviews posted for a dish, oldest first.
    async fn get_reviews_for_dish(&self, dish_id: AggregateId) -> Result<Vec<ReviewRecord>>;

    /// Retrieves up to `limit` undelivered outbox messages in commit order.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Marks messages as delivered.
    async fn mark_dispatched(&self, ids: &[OutboxId]) -> Result<()>;

    /// Records a failed delivery attempt. The message stays pending.
    async fn record_dispatch_failure(&self, id: OutboxId, error: &str) -> Result<()>;
}

/// Extension trait providing convenience methods for stock stores.
#[async_trait]
pub trait StockStoreExt: StockStore {
    /// Returns the quantity on hand of an ingredient, if it exists.
    async fn quantity_on_hand(&self, id: IngredientId) -> Result<Option<u64>> {
        Ok(self
            .get_ingredient(id)
            .await?
            .map(|ingredient| ingredient.quantity_on_hand))
    }

    /// Checks if a dish exists.
    async fn dish_exists(&self, id: AggregateId) -> Result<bool> {
        Ok(self.get_dish(id).await?.is_some())
    }
}

// Blanket implementation for all StockStore implementations
impl<T: StockStore + ?Sized> StockStoreExt for T {}

/// Validates a unit of work before any storage is touched.
pub fn validate_unit_of_work(work: &UnitOfWork) -> Result<()> {
    if let Some(adjustment) = work.adjustments.iter().find(|a| a.amount() == 0) {
        return Err(StoreError::InvalidUnitOfWork(format!(
            "zero stock adjustment for ingredient {}",
            adjustment.ingredient_id()
        )));
    }

    let mut ingredient_ids = HashSet::new();
    for ingredient in &work.new_ingredients {
        if !ingredient_ids.insert(ingredient.id) {
            return Err(StoreError::Duplicate {
                kind: "ingredient",
                id: ingredient.id.to_string(),
            });
        }
    }

    let mut dish_ids = HashSet::new();
    for dish in &work.new_dishes {
        if !dish_ids.insert(dish.id) {
            return Err(StoreError::Duplicate {
                kind: "dish",
                id: dish.id.to_string(),
            });
        }
        if let Some(line) = dish.recipe.iter().find(|line| line.quantity_per_unit == 0) {
            return Err(StoreError::InvalidUnitOfWork(format!(
                "dish {} uses zero units of ingredient {}",
                dish.id, line.ingredient_id
            )));
        }
    }

    if let Some(review) = work
        .new_reviews
        .iter()
        .find(|review| !(1..=5).contains(&review.rating))
    {
        return Err(StoreError::InvalidUnitOfWork(format!(
            "review {} has rating {} outside 1-5",
            review.id, review.rating
        )));
    }

    let mut message_ids = HashSet::new();
    for message in &work.messages {
        if !message_ids.insert(message.id) {
            return Err(StoreError::Duplicate {
                kind: "outbox message",
                id: message.id.to_string(),
            });
        }
    }

    Ok(())
}
