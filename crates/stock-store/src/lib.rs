pub mod error;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod records;
pub mod store;

pub use common::{AggregateId, IngredientId, OrderId, ReviewId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStockStore;
pub use outbox::{OutboxId, OutboxMessage, OutboxMessageBuilder};
pub use postgres::PostgresStockStore;
pub use records::{DishRecord, IngredientRecord, RecipeLineRecord, ReviewRecord};
pub use store::{
    NetAdjustment, StockAdjustment, StockStore, StockStoreExt, UnitOfWork, validate_unit_of_work,
};
