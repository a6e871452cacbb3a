//! Value objects for the dish domain.

use chrono::{DateTime, Utc};
use common::{AggregateId, IngredientId, ReviewId};
use serde::{Deserialize, Serialize};
use stock_store::{IngredientRecord, ReviewRecord};

use super::DishError;

/// An ingredient and the stock currently on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub quantity_on_hand: u64,
}

impl Ingredient {
    /// Creates a new ingredient.
    pub fn new(id: IngredientId, name: impl Into<String>, quantity_on_hand: u64) -> Self {
        Self {
            id,
            name: name.into(),
            quantity_on_hand,
        }
    }

    /// Returns true if at least `amount` is on hand.
    pub fn can_supply(&self, amount: u64) -> bool {
        self.quantity_on_hand >= amount
    }
}

impl From<IngredientRecord> for Ingredient {
    fn from(record: IngredientRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            quantity_on_hand: record.quantity_on_hand,
        }
    }
}

/// A requested recipe line, before the ingredient is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeItem {
    pub ingredient_id: IngredientId,
    pub quantity_per_unit: u32,
}

impl RecipeItem {
    /// Creates a new recipe item.
    pub fn new(ingredient_id: IngredientId, quantity_per_unit: u32) -> Self {
        Self {
            ingredient_id,
            quantity_per_unit,
        }
    }
}

/// One line of a dish's recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub quantity_per_unit: u32,
}

impl RecipeLine {
    /// Amount of the ingredient needed for `quantity` units of the dish.
    pub fn required_for(&self, quantity: u32) -> u64 {
        u64::from(self.quantity_per_unit) * u64::from(quantity)
    }
}

/// A dish and how many units of it an order wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedDish {
    pub dish_id: AggregateId,
    pub quantity: u32,
}

impl OrderedDish {
    /// Creates a new ordered dish.
    pub fn new(dish_id: AggregateId, quantity: u32) -> Self {
        Self { dish_id, quantity }
    }
}

/// A review rating between 1 and 5 stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReviewRating(u8);

impl ReviewRating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Returns the number of stars.
    pub fn stars(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ReviewRating {
    type Error = DishError;

    fn try_from(rating: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&rating) {
            Ok(Self(rating))
        } else {
            Err(DishError::InvalidRating { rating })
        }
    }
}

impl From<ReviewRating> for u8 {
    fn from(rating: ReviewRating) -> Self {
        rating.0
    }
}

impl std::fmt::Display for ReviewRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

/// A review posted for a dish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishReview {
    pub id: ReviewId,
    pub dish_id: AggregateId,
    pub rating: ReviewRating,
    pub description: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl From<&DishReview> for ReviewRecord {
    fn from(review: &DishReview) -> Self {
        ReviewRecord {
            id: review.id,
            dish_id: review.dish_id,
            rating: review.rating.stars(),
            description: review.description.clone(),
            author: review.author.clone(),
            created_at: review.created_at,
        }
    }
}

impl TryFrom<ReviewRecord> for DishReview {
    type Error = DishError;

    fn try_from(record: ReviewRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            dish_id: record.dish_id,
            rating: ReviewRating::try_from(record.rating)?,
            description: record.description,
            author: record.author,
            created_at: record.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(ReviewRating::try_from(0).is_err());
        assert_eq!(ReviewRating::try_from(1).unwrap().stars(), 1);
        assert_eq!(ReviewRating::try_from(5).unwrap().stars(), 5);
        assert!(matches!(
            ReviewRating::try_from(6),
            Err(DishError::InvalidRating { rating: 6 })
        ));
    }

    #[test]
    fn test_rating_deserialization_is_validated() {
        let rating: ReviewRating = serde_json::from_str("4").unwrap();
        assert_eq!(rating.stars(), 4);
        assert!(serde_json::from_str::<ReviewRating>("7").is_err());
        assert_eq!(rating.to_string(), "4/5");
    }

    #[test]
    fn test_required_for_does_not_overflow() {
        let line = RecipeLine {
            ingredient_id: IngredientId::new(),
            ingredient_name: "flour".to_string(),
            quantity_per_unit: u32::MAX,
        };
        assert_eq!(line.required_for(2), u64::from(u32::MAX) * 2);
    }

    #[test]
    fn test_ingredient_can_supply() {
        let flour = Ingredient::new(IngredientId::new(), "flour", 10);
        assert!(flour.can_supply(10));
        assert!(!flour.can_supply(11));
    }
}
