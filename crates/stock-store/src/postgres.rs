use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, DishRecord, IngredientId, IngredientRecord, OutboxId, OutboxMessage,
    RecipeLineRecord, Result, ReviewId, ReviewRecord, StoreError,
    store::{NetAdjustment, StockStore, UnitOfWork, validate_unit_of_work},
};

/// PostgreSQL-backed stock store implementation.
///
/// A unit of work runs in one transaction. Stock draws are conditional
/// updates, so the row lock taken by the first writer makes a concurrent
/// writer re-check the condition against the committed quantity.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_ingredient(row: PgRow) -> Result<IngredientRecord> {
        Ok(IngredientRecord {
            id: IngredientId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            quantity_on_hand: to_u64("quantity_on_hand", row.try_get("quantity_on_hand")?)?,
            version: row.try_get("version")?,
        })
    }

    fn row_to_review(row: PgRow) -> Result<ReviewRecord> {
        let rating: i16 = row.try_get("rating")?;
        Ok(ReviewRecord {
            id: ReviewId::from_uuid(row.try_get::<Uuid, _>("id")?),
            dish_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("dish_id")?),
            rating: u8::try_from(rating).map_err(|_| StoreError::CorruptValue {
                column: "rating",
                value: i64::from(rating),
            })?,
            description: row.try_get("description")?,
            author: row.try_get("author")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_message(row: PgRow) -> Result<OutboxMessage> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let attempts: i32 = row.try_get("attempts")?;

        Ok(OutboxMessage {
            id: OutboxId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sequence: row.try_get("sequence")?,
            event_type: row.try_get("event_type")?,
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata: serde_json::from_value(metadata_json)?,
            attempts: u32::try_from(attempts).map_err(|_| StoreError::CorruptValue {
                column: "attempts",
                value: i64::from(attempts),
            })?,
            last_error: row.try_get("last_error")?,
            dispatched_at: row.try_get("dispatched_at")?,
        })
    }

    /// Loads the recipe lines of the given dishes, grouped by dish.
    async fn load_recipes(
        &self,
        dish_ids: &[Uuid],
    ) -> Result<HashMap<AggregateId, Vec<RecipeLineRecord>>> {
        let rows = sqlx::query(
            r#"
            SELECT dish_id, ingredient_id, quantity_per_unit
            FROM dish_ingredients
            WHERE dish_id = ANY($1)
            ORDER BY dish_id, position ASC
            "#,
        )
        .bind(dish_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut recipes: HashMap<AggregateId, Vec<RecipeLineRecord>> = HashMap::new();
        for row in rows {
            let dish_id = AggregateId::from_uuid(row.try_get::<Uuid, _>("dish_id")?);
            let quantity: i32 = row.try_get("quantity_per_unit")?;
            recipes.entry(dish_id).or_default().push(RecipeLineRecord {
                ingredient_id: IngredientId::from_uuid(row.try_get::<Uuid, _>("ingredient_id")?),
                quantity_per_unit: u32::try_from(quantity).map_err(|_| {
                    StoreError::CorruptValue {
                        column: "quantity_per_unit",
                        value: i64::from(quantity),
                    }
                })?,
            });
        }
        Ok(recipes)
    }

    async fn insert_ingredients(
        tx: &mut Transaction<'_, Postgres>,
        ingredients: &[IngredientRecord],
    ) -> Result<()> {
        for ingredient in ingredients {
            sqlx::query(
                r#"
                INSERT INTO ingredients (id, name, quantity_on_hand, version)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(ingredient.id.as_uuid())
            .bind(&ingredient.name)
            .bind(to_i64(ingredient.quantity_on_hand)?)
            .bind(ingredient.version)
            .execute(&mut **tx)
            .await
            .map_err(|e| duplicate_or_database(e, "ingredient", ingredient.id.to_string()))?;
        }
        Ok(())
    }

    async fn insert_dishes(tx: &mut Transaction<'_, Postgres>, dishes: &[DishRecord]) -> Result<()> {
        for dish in dishes {
            let ingredient_ids: Vec<Uuid> = dish.ingredient_ids().map(|id| id.as_uuid()).collect();
            let known: Vec<Uuid> =
                sqlx::query_scalar("SELECT id FROM ingredients WHERE id = ANY($1)")
                    .bind(&ingredient_ids)
                    .fetch_all(&mut **tx)
                    .await?;
            if let Some(missing) = ingredient_ids.iter().find(|id| !known.contains(id)) {
                return Err(StoreError::IngredientNotFound(IngredientId::from_uuid(
                    *missing,
                )));
            }

            sqlx::query("INSERT INTO dishes (id, name, created_at) VALUES ($1, $2, $3)")
                .bind(dish.id.as_uuid())
                .bind(&dish.name)
                .bind(dish.created_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| duplicate_or_database(e, "dish", dish.id.to_string()))?;

            for (position, line) in dish.recipe.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO dish_ingredients (dish_id, ingredient_id, position, quantity_per_unit)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(dish.id.as_uuid())
                .bind(line.ingredient_id.as_uuid())
                .bind(i32::try_from(position).map_err(|_| {
                    StoreError::InvalidUnitOfWork(format!("dish {} has too many lines", dish.id))
                })?)
                .bind(i32::try_from(line.quantity_per_unit).map_err(|_| {
                    StoreError::InvalidUnitOfWork(format!(
                        "quantity per unit {} is out of range",
                        line.quantity_per_unit
                    ))
                })?)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    /// Applies one net stock change as a compare-and-decrement.
    async fn apply_adjustment(
        tx: &mut Transaction<'_, Postgres>,
        ingredient_id: IngredientId,
        adjustment: NetAdjustment,
    ) -> Result<()> {
        let drawn = to_i64(adjustment.drawn)?;
        let restocked = to_i64(adjustment.restocked)?;

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE ingredients
            SET quantity_on_hand = quantity_on_hand + $2 - $3,
                version = version + 1
            WHERE id = $1 AND quantity_on_hand + $2 >= $3
            RETURNING quantity_on_hand
            "#,
        )
        .bind(ingredient_id.as_uuid())
        .bind(restocked)
        .bind(drawn)
        .fetch_optional(&mut **tx)
        .await?;

        if updated.is_some() {
            return Ok(());
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity_on_hand FROM ingredients WHERE id = $1")
                .bind(ingredient_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;

        match available {
            None => Err(StoreError::IngredientNotFound(ingredient_id)),
            Some(available) => {
                metrics::counter!("stock_draws_rejected_total").increment(1);
                Err(StoreError::InsufficientStock {
                    ingredient_id,
                    requested: adjustment.drawn,
                    available: to_u64("quantity_on_hand", available)?
                        .saturating_add(adjustment.restocked),
                })
            }
        }
    }

    async fn insert_reviews(
        tx: &mut Transaction<'_, Postgres>,
        reviews: &[ReviewRecord],
    ) -> Result<()> {
        for review in reviews {
            let dish_exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM dishes WHERE id = $1)")
                    .bind(review.dish_id.as_uuid())
                    .fetch_one(&mut **tx)
                    .await?;
            if !dish_exists {
                return Err(StoreError::DishNotFound(review.dish_id));
            }

            sqlx::query(
                r#"
                INSERT INTO dish_reviews (id, dish_id, rating, description, author, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(review.id.as_uuid())
            .bind(review.dish_id.as_uuid())
            .bind(i16::from(review.rating))
            .bind(&review.description)
            .bind(&review.author)
            .bind(review.created_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| duplicate_or_database(e, "review", review.id.to_string()))?;
        }
        Ok(())
    }

    async fn insert_messages(
        tx: &mut Transaction<'_, Postgres>,
        messages: &[OutboxMessage],
    ) -> Result<()> {
        for message in messages {
            let metadata_json = serde_json::to_value(&message.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO outbox (id, event_type, aggregate_type, aggregate_id, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(message.id.as_uuid())
            .bind(&message.event_type)
            .bind(&message.aggregate_type)
            .bind(message.aggregate_id.as_uuid())
            .bind(message.timestamp)
            .bind(&message.payload)
            .bind(metadata_json)
            .execute(&mut **tx)
            .await
            .map_err(|e| duplicate_or_database(e, "outbox message", message.id.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        validate_unit_of_work(&work)?;
        let net = work.net_adjustments()?;

        // Dropping the transaction on an early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        Self::insert_ingredients(&mut tx, &work.new_ingredients).await?;
        Self::insert_dishes(&mut tx, &work.new_dishes).await?;

        // BTreeMap order: every writer locks ingredient rows in the same order.
        for (ingredient_id, adjustment) in net {
            Self::apply_adjustment(&mut tx, ingredient_id, adjustment).await?;
        }

        Self::insert_reviews(&mut tx, &work.new_reviews).await?;
        Self::insert_messages(&mut tx, &work.messages).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_ingredient(&self, id: IngredientId) -> Result<Option<IngredientRecord>> {
        let row = sqlx::query(
            "SELECT id, name, quantity_on_hand, version FROM ingredients WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_ingredient).transpose()
    }

    async fn get_ingredients(&self, ids: &[IngredientId]) -> Result<Vec<IngredientRecord>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, name, quantity_on_hand, version FROM ingredients WHERE id = ANY($1)",
        )
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_ingredient).collect()
    }

    async fn get_dish(&self, id: AggregateId) -> Result<Option<DishRecord>> {
        let row = sqlx::query("SELECT id, name, created_at FROM dishes WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut recipes = self.load_recipes(&[id.as_uuid()]).await?;
        Ok(Some(DishRecord {
            id,
            name: row.try_get("name")?,
            recipe: recipes.remove(&id).unwrap_or_default(),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        }))
    }

    async fn list_dishes(&self) -> Result<Vec<DishRecord>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM dishes ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut recipes = self.load_recipes(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let id = AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?);
                Ok(DishRecord {
                    id,
                    name: row.try_get("name")?,
                    recipe: recipes.remove(&id).unwrap_or_default(),
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn get_reviews_for_dish(&self, dish_id: AggregateId) -> Result<Vec<ReviewRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, dish_id, rating, description, author, created_at
            FROM dish_reviews
            WHERE dish_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(dish_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_review).collect()
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, event_type, aggregate_type, aggregate_id, timestamp, payload,
                   metadata, attempts, last_error, dispatched_at
            FROM outbox
            WHERE dispatched_at IS NULL
            ORDER BY sequence ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn mark_dispatched(&self, ids: &[OutboxId]) -> Result<()> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();

        let known: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM outbox WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await?;
        if let Some(missing) = uuids.iter().find(|id| !known.contains(id)) {
            return Err(StoreError::MessageNotFound(OutboxId::from_uuid(*missing)));
        }

        sqlx::query(
            r#"
            UPDATE outbox
            SET dispatched_at = NOW(), attempts = attempts + 1, last_error = NULL
            WHERE id = ANY($1) AND dispatched_at IS NULL
            "#,
        )
        .bind(&uuids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_dispatch_failure(&self, id: OutboxId, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MessageNotFound(id));
        }
        Ok(())
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidUnitOfWork(format!("quantity {value} is out of range")))
}

fn to_u64(column: &'static str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::CorruptValue { column, value })
}

fn duplicate_or_database(error: sqlx::Error, kind: &'static str, id: String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.is_unique_violation()
    {
        return StoreError::Duplicate { kind, id };
    }
    StoreError::Database(error)
}
