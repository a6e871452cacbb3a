//! Domain error types.

use stock_store::StoreError;
use thiserror::Error;

use crate::dish::DishError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the stock store.
    #[error("Stock store error: {0}")]
    Store(StoreError),

    /// A dish rule rejected the command.
    #[error("Dish error: {0}")]
    Dish(#[from] DishError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`DomainError`] for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced dish or ingredient does not exist. Correct the request.
    NotFound,
    /// Not enough stock right now. Retry after restocking or with less.
    OutOfStock,
    /// The request itself is malformed.
    Invalid,
    /// Storage or serialization failed.
    Infrastructure,
}

impl DomainError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Dish(err) => match err {
                DishError::IngredientNotFound(_) | DishError::DishNotFound(_) => {
                    ErrorKind::NotFound
                }
                DishError::OutOfStock { .. } => ErrorKind::OutOfStock,
                DishError::InvalidName
                | DishError::EmptyRecipe
                | DishError::InvalidQuantity { .. }
                | DishError::InvalidRating { .. } => ErrorKind::Invalid,
            },
            DomainError::Store(StoreError::Duplicate { .. })
            | DomainError::Store(StoreError::InvalidUnitOfWork(_)) => ErrorKind::Invalid,
            DomainError::Store(_) | DomainError::Serialization(_) => ErrorKind::Infrastructure,
        }
    }
}

// Business rejections raised by the store at commit time surface exactly
// like the ones raised by the aggregate.
impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                ingredient_id,
                requested,
                available,
            } => DomainError::Dish(DishError::OutOfStock {
                ingredient_id,
                required: requested,
                available,
            }),
            StoreError::IngredientNotFound(id) => DomainError::Dish(DishError::IngredientNotFound(id)),
            StoreError::DishNotFound(id) => DomainError::Dish(DishError::DishNotFound(id)),
            other => DomainError::Store(other),
        }
    }
}
