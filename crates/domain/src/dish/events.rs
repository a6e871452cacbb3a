//! Dish domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, IngredientId, OrderId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{OrderedDish, RecipeLine};

/// Events that can occur on a dish aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DishEvent {
    /// Dish was created.
    DishCreated(DishCreatedData),

    /// Units of the dish were prepared and their ingredients consumed.
    DishPrepared(DishPreparedData),
}

impl DomainEvent for DishEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DishEvent::DishCreated(_) => "DishCreated",
            DishEvent::DishPrepared(_) => "DishPrepared",
        }
    }
}

/// Data for DishCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishCreatedData {
    pub dish_id: AggregateId,
    pub name: String,
    /// The recipe, in recipe order.
    pub ingredients: Vec<RecipeLine>,
    pub created_at: DateTime<Utc>,
}

/// Data for DishPrepared event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishPreparedData {
    pub dish_id: AggregateId,

    /// Units prepared.
    pub quantity: u32,

    /// Stock drawn per recipe line.
    pub consumed: Vec<ConsumedIngredient>,

    pub prepared_at: DateTime<Utc>,
}

/// Stock drawn from one ingredient by a preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedIngredient {
    pub ingredient_id: IngredientId,
    pub amount: u64,
}

/// Terminal event of a fulfilled batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishesPreparedEvent {
    pub order_id: OrderId,
    pub dishes: Vec<OrderedDish>,
    pub prepared_at: DateTime<Utc>,
}

/// Events about a whole fulfillment batch rather than a single dish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FulfillmentEvent {
    /// Every dish of the order was prepared.
    DishesPrepared(DishesPreparedEvent),
}

impl FulfillmentEvent {
    /// Aggregate type used when recording batch events.
    pub const AGGREGATE_TYPE: &'static str = "Order";
}

impl DomainEvent for FulfillmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FulfillmentEvent::DishesPrepared(_) => "DishesPrepared",
        }
    }
}

// Convenience constructors for events
impl DishEvent {
    /// Creates a DishCreated event.
    pub fn dish_created(
        dish_id: AggregateId,
        name: impl Into<String>,
        ingredients: Vec<RecipeLine>,
        created_at: DateTime<Utc>,
    ) -> Self {
        DishEvent::DishCreated(DishCreatedData {
            dish_id,
            name: name.into(),
            ingredients,
            created_at,
        })
    }

    /// Creates a DishPrepared event.
    pub fn dish_prepared(
        dish_id: AggregateId,
        quantity: u32,
        consumed: Vec<ConsumedIngredient>,
    ) -> Self {
        DishEvent::DishPrepared(DishPreparedData {
            dish_id,
            quantity,
            consumed,
            prepared_at: Utc::now(),
        })
    }

    /// Returns the dish this event belongs to.
    pub fn dish_id(&self) -> AggregateId {
        match self {
            DishEvent::DishCreated(data) => data.dish_id,
            DishEvent::DishPrepared(data) => data.dish_id,
        }
    }
}

impl FulfillmentEvent {
    /// Creates a DishesPrepared event.
    pub fn dishes_prepared(order_id: OrderId, dishes: Vec<OrderedDish>) -> Self {
        FulfillmentEvent::DishesPrepared(DishesPreparedEvent {
            order_id,
            dishes,
            prepared_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let dish_id = AggregateId::new();
        assert_eq!(
            DishEvent::dish_created(dish_id, "Pizza", vec![], Utc::now()).event_type(),
            "DishCreated"
        );
        assert_eq!(
            DishEvent::dish_prepared(dish_id, 2, vec![]).event_type(),
            "DishPrepared"
        );
        assert_eq!(
            FulfillmentEvent::dishes_prepared(OrderId::new(), vec![]).event_type(),
            "DishesPrepared"
        );
    }

    #[test]
    fn test_prepared_payload_shape() {
        let dish_id = AggregateId::new();
        let flour = IngredientId::new();
        let event = DishEvent::dish_prepared(
            dish_id,
            2,
            vec![ConsumedIngredient {
                ingredient_id: flour,
                amount: 8,
            }],
        );

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "DishPrepared");
        assert_eq!(json["data"]["dish_id"], dish_id.to_string());
        assert_eq!(json["data"]["quantity"], 2);
        assert_eq!(json["data"]["consumed"][0]["amount"], 8);
        assert!(json["data"]["consumed"][0].get("remaining").is_none());

        let decoded: DishEvent = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_batch_payload_carries_order() {
        let order_id = OrderId::new();
        let dish_id = AggregateId::new();
        let event =
            FulfillmentEvent::dishes_prepared(order_id, vec![OrderedDish::new(dish_id, 3)]);

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "DishesPrepared");
        assert_eq!(json["data"]["order_id"], order_id.to_string());
        assert_eq!(json["data"]["dishes"][0]["quantity"], 3);
    }
}
