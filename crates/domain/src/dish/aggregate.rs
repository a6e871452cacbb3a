//! Dish aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, IngredientId};
use stock_store::{DishRecord, RecipeLineRecord};

use crate::aggregate::Aggregate;

use super::{ConsumedIngredient, DishError, DishEvent, Pantry, RecipeItem, RecipeLine};

/// Dish aggregate root.
///
/// A named dish with a fixed recipe. Preparing N units draws N times every
/// recipe line from the pantry, or nothing at all.
#[derive(Debug, Clone)]
pub struct Dish {
    id: AggregateId,
    name: String,
    recipe: Vec<RecipeLine>,
    created_at: DateTime<Utc>,
    events: Vec<DishEvent>,
}

impl Aggregate for Dish {
    type Event = DishEvent;

    fn aggregate_type() -> &'static str {
        "Dish"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn list_events(&self) -> &[DishEvent] {
        &self.events
    }

    fn clear_events(&mut self) {
        self.events.clear();
    }
}

// Query methods
impl Dish {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the recipe in recipe order.
    pub fn recipe(&self) -> &[RecipeLine] {
        &self.recipe
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns what `quantity` units draw from each ingredient.
    pub fn requirements(&self, quantity: u32) -> impl Iterator<Item = (IngredientId, u64)> + '_ {
        self.recipe
            .iter()
            .map(move |line| (line.ingredient_id, line.required_for(quantity)))
    }

    /// Checks whether `quantity` units could be prepared from the pantry.
    ///
    /// Fails with the first short recipe line.
    pub fn check_stock(&self, quantity: u32, pantry: &Pantry) -> Result<(), DishError> {
        if quantity == 0 {
            return Err(DishError::InvalidQuantity { quantity: 0 });
        }

        for (ingredient_id, required) in self.requirements(quantity) {
            let ingredient = pantry
                .get(ingredient_id)
                .ok_or(DishError::IngredientNotFound(ingredient_id))?;
            if !ingredient.can_supply(required) {
                return Err(DishError::OutOfStock {
                    ingredient_id,
                    required,
                    available: ingredient.quantity_on_hand,
                });
            }
        }
        Ok(())
    }

    /// Returns true if `quantity` units could be prepared from the pantry.
    pub fn can_prepare(&self, quantity: u32, pantry: &Pantry) -> bool {
        self.check_stock(quantity, pantry).is_ok()
    }

    /// Converts the dish into its stored form.
    pub fn to_record(&self) -> DishRecord {
        DishRecord {
            id: self.id,
            name: self.name.clone(),
            recipe: self
                .recipe
                .iter()
                .map(|line| RecipeLineRecord {
                    ingredient_id: line.ingredient_id,
                    quantity_per_unit: line.quantity_per_unit,
                })
                .collect(),
            created_at: self.created_at,
        }
    }
}

// Command methods
impl Dish {
    /// Creates a new dish, staging a DishCreated event.
    ///
    /// Every ingredient must exist in the pantry. An ingredient listed more
    /// than once gets a single line with the quantities summed.
    pub fn create(
        id: AggregateId,
        name: impl Into<String>,
        recipe: Vec<RecipeItem>,
        pantry: &Pantry,
    ) -> Result<Self, DishError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DishError::InvalidName);
        }
        if recipe.is_empty() {
            return Err(DishError::EmptyRecipe);
        }

        let mut lines: Vec<RecipeLine> = Vec::with_capacity(recipe.len());
        for item in recipe {
            if item.quantity_per_unit == 0 {
                return Err(DishError::InvalidQuantity { quantity: 0 });
            }
            let ingredient = pantry
                .get(item.ingredient_id)
                .ok_or(DishError::IngredientNotFound(item.ingredient_id))?;

            match lines
                .iter_mut()
                .find(|line| line.ingredient_id == item.ingredient_id)
            {
                Some(line) => {
                    line.quantity_per_unit = line
                        .quantity_per_unit
                        .checked_add(item.quantity_per_unit)
                        .ok_or(DishError::InvalidQuantity {
                            quantity: u64::from(line.quantity_per_unit)
                                + u64::from(item.quantity_per_unit),
                        })?;
                }
                None => lines.push(RecipeLine {
                    ingredient_id: ingredient.id,
                    ingredient_name: ingredient.name.clone(),
                    quantity_per_unit: item.quantity_per_unit,
                }),
            }
        }

        let created_at = Utc::now();
        let event = DishEvent::dish_created(id, name.clone(), lines.clone(), created_at);

        Ok(Self {
            id,
            name,
            recipe: lines,
            created_at,
            events: vec![event],
        })
    }

    /// Rebuilds a stored dish. Ingredient names come from the pantry.
    pub fn restore(record: DishRecord, pantry: &Pantry) -> Result<Self, DishError> {
        let recipe = record
            .recipe
            .iter()
            .map(|line| {
                let ingredient = pantry
                    .get(line.ingredient_id)
                    .ok_or(DishError::IngredientNotFound(line.ingredient_id))?;
                Ok(RecipeLine {
                    ingredient_id: line.ingredient_id,
                    ingredient_name: ingredient.name.clone(),
                    quantity_per_unit: line.quantity_per_unit,
                })
            })
            .collect::<Result<Vec<_>, DishError>>()?;

        Ok(Self {
            id: record.id,
            name: record.name,
            recipe,
            created_at: record.created_at,
            events: Vec::new(),
        })
    }

    /// Prepares `quantity` units, drawing every recipe line from the pantry
    /// and staging a DishPrepared event.
    ///
    /// On failure neither the pantry nor the dish is changed.
    pub fn prepare(&mut self, quantity: u32, pantry: &mut Pantry) -> Result<(), DishError> {
        self.check_stock(quantity, pantry)?;

        let mut consumed = Vec::with_capacity(self.recipe.len());
        for (ingredient_id, amount) in self.requirements(quantity) {
            pantry.draw(ingredient_id, amount)?;
            consumed.push(ConsumedIngredient {
                ingredient_id,
                amount,
            });
        }

        self.events
            .push(DishEvent::dish_prepared(self.id, quantity, consumed));
        Ok(())
    }
}
