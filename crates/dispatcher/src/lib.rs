//! Outbox dispatcher process.
//!
//! Polls the Postgres outbox and hands committed messages to the in-process
//! event bus. The binary wires configuration, logging and metrics around
//! [`event_channel::OutboxDispatcher`].

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, LogFormat};
pub use logging::{LoggingSubscriber, init_tracing};

use std::sync::Arc;

use event_channel::{InMemoryEventBus, PreparedOrdersView};

/// Builds the bus the process publishes to.
pub fn default_bus() -> (InMemoryEventBus, PreparedOrdersView) {
    let prepared_orders = PreparedOrdersView::new();

    let mut bus = InMemoryEventBus::new();
    bus.subscribe(Arc::new(LoggingSubscriber));
    bus.subscribe(Arc::new(prepared_orders.clone()));

    (bus, prepared_orders)
}
