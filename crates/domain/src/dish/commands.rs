//! Dish commands and queries.

use common::{AggregateId, IngredientId, OrderId, ReviewId};

use crate::command::Command;

use super::{DishError, OrderedDish, RecipeItem, ReviewRating};

fn validate_quantities(dishes: &[OrderedDish]) -> Result<(), DishError> {
    match dishes.iter().find(|dish| dish.quantity == 0) {
        Some(_) => Err(DishError::InvalidQuantity { quantity: 0 }),
        None => Ok(()),
    }
}

/// Command to register a new ingredient with its opening stock.
#[derive(Debug, Clone)]
pub struct AddIngredient {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub quantity: u64,
}

impl AddIngredient {
    /// Creates a new AddIngredient command with a generated ingredient ID.
    pub fn new(name: impl Into<String>, quantity: u64) -> Self {
        Self {
            ingredient_id: IngredientId::new(),
            name: name.into(),
            quantity,
        }
    }
}

impl Command for AddIngredient {
    fn validate(&self) -> Result<(), DishError> {
        if self.name.trim().is_empty() {
            return Err(DishError::InvalidName);
        }
        Ok(())
    }
}

/// Command to add stock to an ingredient.
#[derive(Debug, Clone)]
pub struct Restock {
    pub ingredient_id: IngredientId,
    pub amount: u64,
}

impl Restock {
    pub fn new(ingredient_id: IngredientId, amount: u64) -> Self {
        Self {
            ingredient_id,
            amount,
        }
    }
}

impl Command for Restock {
    fn validate(&self) -> Result<(), DishError> {
        if self.amount == 0 {
            return Err(DishError::InvalidQuantity { quantity: 0 });
        }
        Ok(())
    }
}

/// Command to create a new dish.
#[derive(Debug, Clone)]
pub struct CreateDish {
    pub dish_id: AggregateId,
    pub name: String,
    pub recipe: Vec<RecipeItem>,
}

impl CreateDish {
    /// Creates a new CreateDish command with a generated dish ID.
    pub fn new(name: impl Into<String>, recipe: Vec<RecipeItem>) -> Self {
        Self {
            dish_id: AggregateId::new(),
            name: name.into(),
            recipe,
        }
    }

    /// Creates a dish using one unit of each listed ingredient.
    pub fn from_ingredient_ids(
        name: impl Into<String>,
        ingredient_ids: impl IntoIterator<Item = IngredientId>,
    ) -> Self {
        Self::new(
            name,
            ingredient_ids
                .into_iter()
                .map(|id| RecipeItem::new(id, 1))
                .collect(),
        )
    }
}

// The aggregate validates the recipe against the pantry.
impl Command for CreateDish {}

/// Command to prepare every dish of an order, all or nothing.
#[derive(Debug, Clone)]
pub struct PrepareDishes {
    pub order_id: OrderId,
    pub dishes: Vec<OrderedDish>,
}

impl PrepareDishes {
    pub fn new(order_id: OrderId, dishes: Vec<OrderedDish>) -> Self {
        Self { order_id, dishes }
    }
}

impl Command for PrepareDishes {
    fn validate(&self) -> Result<(), DishError> {
        validate_quantities(&self.dishes)
    }
}

/// Query asking whether a batch could be prepared right now.
#[derive(Debug, Clone)]
pub struct IsAvailable {
    pub dishes: Vec<OrderedDish>,
}

impl IsAvailable {
    pub fn new(dishes: Vec<OrderedDish>) -> Self {
        Self { dishes }
    }
}

impl Command for IsAvailable {
    fn validate(&self) -> Result<(), DishError> {
        validate_quantities(&self.dishes)
    }
}

/// Command to post a review for a dish.
#[derive(Debug, Clone)]
pub struct PostDishReview {
    pub review_id: ReviewId,
    pub dish_id: AggregateId,
    pub rating: u8,
    pub description: String,
    pub author: String,
}

impl PostDishReview {
    /// Creates a new PostDishReview command with a generated review ID.
    pub fn new(
        dish_id: AggregateId,
        rating: u8,
        description: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            review_id: ReviewId::new(),
            dish_id,
            rating,
            description: description.into(),
            author: author.into(),
        }
    }
}

impl Command for PostDishReview {
    fn validate(&self) -> Result<(), DishError> {
        ReviewRating::try_from(self.rating).map(|_| ())
    }
}
