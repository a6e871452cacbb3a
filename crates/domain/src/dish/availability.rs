//! Batch availability checks.
//!
//! A pure read over a [`Pantry`]. The result is advisory: stock can change
//! between the check and the commit, and the store re-checks every line.

use std::collections::BTreeMap;

use common::IngredientId;

use super::{Dish, DishError, Pantry};

/// An ingredient a batch needs more of than is on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortage {
    pub ingredient_id: IngredientId,
    pub required: u64,
    pub available: u64,
}

/// Sums what a batch draws from each ingredient.
///
/// The same dish or ingredient may appear in several lines; their needs add up.
pub fn requirements(batch: &[(&Dish, u32)]) -> Result<BTreeMap<IngredientId, u64>, DishError> {
    let mut totals: BTreeMap<IngredientId, u64> = BTreeMap::new();
    for (dish, quantity) in batch {
        if *quantity == 0 {
            return Err(DishError::InvalidQuantity { quantity: 0 });
        }
        for (ingredient_id, required) in dish.requirements(*quantity) {
            let total = totals.entry(ingredient_id).or_default();
            *total = total.saturating_add(required);
        }
    }
    Ok(totals)
}

/// Returns the first ingredient, by id, the batch would run short of.
pub fn find_shortage(
    batch: &[(&Dish, u32)],
    pantry: &Pantry,
) -> Result<Option<Shortage>, DishError> {
    for (ingredient_id, required) in requirements(batch)? {
        let available = pantry.available(ingredient_id)?;
        if available < required {
            return Ok(Some(Shortage {
                ingredient_id,
                required,
                available,
            }));
        }
    }
    Ok(None)
}

/// Returns true if every line of the batch can be prepared together.
pub fn is_available(batch: &[(&Dish, u32)], pantry: &Pantry) -> Result<bool, DishError> {
    Ok(find_shortage(batch, pantry)?.is_none())
}

/// Like [`is_available`], but reports the shortage as `OutOfStock`.
pub fn check(batch: &[(&Dish, u32)], pantry: &Pantry) -> Result<(), DishError> {
    match find_shortage(batch, pantry)? {
        Some(shortage) => Err(shortage.into()),
        None => Ok(()),
    }
}
