//! Shared identifier types for the stock fulfillment workspace.

mod types;

pub use types::{AggregateId, IngredientId, OrderId, ReviewId};
