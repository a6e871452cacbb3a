//! Tracing setup and the log subscriber.

use async_trait::async_trait;
use event_channel::{Result, Subscriber};
use stock_store::OutboxMessage;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Writes one structured log line per delivered message.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSubscriber;

#[async_trait]
impl Subscriber for LoggingSubscriber {
    fn name(&self) -> &'static str {
        "LoggingSubscriber"
    }

    async fn handle(&self, message: &OutboxMessage) -> Result<()> {
        tracing::info!(
            message_id = %message.id,
            sequence = message.sequence,
            event_type = %message.event_type,
            aggregate_type = %message.aggregate_type,
            aggregate_id = %message.aggregate_id,
            "event published"
        );
        Ok(())
    }
}
