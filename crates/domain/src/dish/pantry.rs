//! In-command view of ingredient stock.

use std::collections::BTreeMap;

use common::IngredientId;

use super::{DishError, Ingredient};

/// The ingredients one command reads, and what it has drawn from them.
///
/// Draws only change this view. The store applies the totals from
/// [`Pantry::drawn`] as compare-and-decrement adjustments at commit.
#[derive(Debug, Clone, Default)]
pub struct Pantry {
    ingredients: BTreeMap<IngredientId, Ingredient>,
    drawn: BTreeMap<IngredientId, u64>,
}

impl Pantry {
    /// Creates an empty pantry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pantry holding the given ingredients.
    pub fn from_ingredients(ingredients: impl IntoIterator<Item = Ingredient>) -> Self {
        Self {
            ingredients: ingredients
                .into_iter()
                .map(|ingredient| (ingredient.id, ingredient))
                .collect(),
            drawn: BTreeMap::new(),
        }
    }

    /// Adds or replaces an ingredient.
    pub fn insert(&mut self, ingredient: Ingredient) {
        self.ingredients.insert(ingredient.id, ingredient);
    }

    pub fn get(&self, id: IngredientId) -> Option<&Ingredient> {
        self.ingredients.get(&id)
    }

    pub fn contains(&self, id: IngredientId) -> bool {
        self.ingredients.contains_key(&id)
    }

    /// Returns the quantity currently on hand in this view.
    pub fn available(&self, id: IngredientId) -> Result<u64, DishError> {
        self.get(id)
            .map(|ingredient| ingredient.quantity_on_hand)
            .ok_or(DishError::IngredientNotFound(id))
    }

    /// Takes `amount` of an ingredient, returning what remains.
    pub fn draw(&mut self, id: IngredientId, amount: u64) -> Result<u64, DishError> {
        let ingredient = self
            .ingredients
            .get_mut(&id)
            .ok_or(DishError::IngredientNotFound(id))?;

        let remaining = ingredient
            .quantity_on_hand
            .checked_sub(amount)
            .ok_or(DishError::OutOfStock {
                ingredient_id: id,
                required: amount,
                available: ingredient.quantity_on_hand,
            })?;

        ingredient.quantity_on_hand = remaining;
        *self.drawn.entry(id).or_default() += amount;
        Ok(remaining)
    }

    /// Returns the total drawn per ingredient, ordered by ingredient id.
    pub fn drawn(&self) -> impl Iterator<Item = (IngredientId, u64)> + '_ {
        self.drawn
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(id, amount)| (*id, *amount))
    }

    /// Returns true if nothing has been drawn.
    pub fn is_untouched(&self) -> bool {
        self.drawn().next().is_none()
    }

    pub fn ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.values()
    }
}
