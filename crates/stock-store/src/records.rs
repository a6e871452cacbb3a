//! Persisted row shapes for ingredients, dishes and reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, IngredientId, ReviewId};

/// A stored ingredient with its quantity on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientRecord {
    pub id: IngredientId,
    pub name: String,
    pub quantity_on_hand: u64,
    /// Incremented on every stock change.
    pub version: i64,
}

impl IngredientRecord {
    /// Creates a record for a new ingredient at version 0.
    pub fn new(id: IngredientId, name: impl Into<String>, quantity_on_hand: u64) -> Self {
        Self {
            id,
            name: name.into(),
            quantity_on_hand,
            version: 0,
        }
    }
}

/// One line of a stored recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLineRecord {
    pub ingredient_id: IngredientId,
    pub quantity_per_unit: u32,
}

/// A stored dish and its recipe, in recipe order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishRecord {
    pub id: AggregateId,
    pub name: String,
    pub recipe: Vec<RecipeLineRecord>,
    pub created_at: DateTime<Utc>,
}

impl DishRecord {
    /// Returns the ids of every ingredient the recipe references.
    pub fn ingredient_ids(&self) -> impl Iterator<Item = IngredientId> + '_ {
        self.recipe.iter().map(|line| line.ingredient_id)
    }
}

/// A stored dish review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewId,
    pub dish_id: AggregateId,
    /// Rating between 1 and 5.
    pub rating: u8,
    pub description: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}
