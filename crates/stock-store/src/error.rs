use thiserror::Error;

use crate::{AggregateId, IngredientId, OutboxId};

/// Errors that can occur when interacting with the stock store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stock draw would have taken an ingredient below zero.
    /// The whole unit of work was rolled back.
    #[error(
        "Insufficient stock for ingredient {ingredient_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        ingredient_id: IngredientId,
        requested: u64,
        available: u64,
    },

    /// The ingredient does not exist.
    #[error("Ingredient not found: {0}")]
    IngredientNotFound(IngredientId),

    /// The dish does not exist.
    #[error("Dish not found: {0}")]
    DishNotFound(AggregateId),

    /// The outbox message does not exist.
    #[error("Outbox message not found: {0}")]
    MessageNotFound(OutboxId),

    /// A record with the same identifier already exists.
    #[error("Duplicate {kind}: {id}")]
    Duplicate { kind: &'static str, id: String },

    /// The unit of work was rejected before touching storage.
    #[error("Invalid unit of work: {0}")]
    InvalidUnitOfWork(String),

    /// An outbox message was built without a required field.
    #[error("Outbox message is missing required field '{0}'")]
    IncompleteMessage(&'static str),

    /// A stored value does not fit the domain representation.
    #[error("Corrupt value in column '{column}': {value}")]
    CorruptValue { column: &'static str, value: i64 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
