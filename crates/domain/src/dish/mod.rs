//! Dish aggregate and the batch fulfillment flow built on it.

mod aggregate;
pub mod availability;
mod commands;
mod events;
mod pantry;
mod service;
mod value_objects;

pub use aggregate::Dish;
pub use availability::Shortage;
pub use commands::*;
pub use events::{
    ConsumedIngredient, DishCreatedData, DishEvent, DishPreparedData, DishesPreparedEvent,
    FulfillmentEvent,
};
pub use pantry::Pantry;
pub use service::{DishService, PreparedBatch};
pub use value_objects::{DishReview, Ingredient, OrderedDish, RecipeItem, RecipeLine, ReviewRating};

use common::{AggregateId, IngredientId};
use thiserror::Error;

/// Errors that can occur during dish operations.
#[derive(Debug, Error)]
pub enum DishError {
    /// A referenced ingredient does not exist.
    #[error("Ingredient with id '{0}' could not be found")]
    IngredientNotFound(IngredientId),

    /// A referenced dish does not exist.
    #[error("Dish with id '{0}' could not be found")]
    DishNotFound(AggregateId),

    /// Not enough of an ingredient is on hand.
    #[error("Out of stock: ingredient {ingredient_id} requires {required}, {available} available")]
    OutOfStock {
        ingredient_id: IngredientId,
        required: u64,
        available: u64,
    },

    /// Dish or ingredient name is blank.
    #[error("Name must not be blank")]
    InvalidName,

    /// A dish needs at least one ingredient.
    #[error("Recipe has no ingredients")]
    EmptyRecipe,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u64 },

    /// Rating outside 1-5.
    #[error("Invalid rating: {rating} (must be between 1 and 5)")]
    InvalidRating { rating: u8 },
}

impl From<Shortage> for DishError {
    fn from(shortage: Shortage) -> Self {
        DishError::OutOfStock {
            ingredient_id: shortage.ingredient_id,
            required: shortage.required,
            available: shortage.available,
        }
    }
}
