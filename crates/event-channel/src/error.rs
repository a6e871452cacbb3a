//! Event channel error types.

use thiserror::Error;

/// Errors that can occur while delivering outbox messages.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// An error occurred in the stock store.
    #[error("Stock store error: {0}")]
    Store(#[from] stock_store::StoreError),

    /// Failed to deserialize a message payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// One or more subscribers rejected a message.
    #[error("Delivery failed for {subscriber}: {reason}")]
    Delivery {
        subscriber: &'static str,
        reason: String,
    },

    /// A subscriber-specific error.
    #[error("Subscriber error: {0}")]
    Subscriber(String),
}

/// Result type for event channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
