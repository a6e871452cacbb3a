//! Domain layer for the stock service.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for aggregates that stage their events
//! - Command trait and CommandResult
//! - Dish aggregate, pantry view and batch availability checks
//! - DishService, the command handler that fulfills dish batches atomically

pub mod aggregate;
pub mod command;
pub mod dish;
pub mod error;

pub use aggregate::{Aggregate, DomainEvent, drain_to_outbox, outbox_message};
pub use command::{Command, CommandResult};
pub use dish::{
    AddIngredient, ConsumedIngredient, CreateDish, Dish, DishCreatedData, DishError, DishEvent,
    DishPreparedData, DishReview, DishService, DishesPreparedEvent, FulfillmentEvent, Ingredient,
    IsAvailable, OrderedDish, Pantry, PostDishReview, PrepareDishes, PreparedBatch, RecipeItem,
    RecipeLine, Restock, ReviewRating, Shortage, availability,
};
pub use error::{DomainError, ErrorKind};
