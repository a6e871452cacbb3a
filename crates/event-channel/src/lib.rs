//! Delivery side of the transactional outbox.
//!
//! This crate provides:
//! - [`OutboxDispatcher`] which moves committed outbox messages to a publisher
//! - [`EventPublisher`] and the fan-out [`InMemoryEventBus`]
//! - [`Subscriber`] trait with at-least-once delivery semantics
//! - Two read models fed by subscribers: prepared orders and dish sales

pub mod dispatcher;
pub mod error;
pub mod publisher;
pub mod read_model;
pub mod subscriber;
pub mod views;

pub use dispatcher::{DispatchReport, OutboxDispatcher};
pub use error::{ChannelError, Result};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use read_model::ReadModel;
pub use subscriber::{SeenMessages, Subscriber};
pub use views::{DishSales, DishSalesView, PreparedOrder, PreparedOrdersView};
