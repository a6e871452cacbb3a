//! Outbox dispatcher: delivers committed messages to a publisher.

use std::future::Future;
use std::time::Duration;

use stock_store::{OutboxId, StockStore};

use crate::Result;
use crate::publisher::EventPublisher;

/// Default number of messages fetched per pass.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// What one dispatch pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Messages delivered and marked as dispatched.
    pub delivered: usize,

    /// The message whose delivery failed, with the error. The pass stops
    /// there so later messages never overtake it.
    pub failed: Option<(OutboxId, String)>,
}

impl DispatchReport {
    /// Returns true if the pass stopped on a failed delivery.
    pub fn has_failure(&self) -> bool {
        self.failed.is_some()
    }
}

/// Moves pending outbox messages to an [`EventPublisher`], in commit order.
///
/// A message is marked as dispatched right after the publisher accepts it.
/// If the process dies in between, the message is delivered again on the
/// next run, which is why subscribers deduplicate by message id.
pub struct OutboxDispatcher<S: StockStore, P: EventPublisher> {
    store: S,
    publisher: P,
    batch_size: usize,
}

impl<S: StockStore, P: EventPublisher> OutboxDispatcher<S, P> {
    /// Creates a new dispatcher.
    pub fn new(store: S, publisher: P) -> Self {
        Self {
            store,
            publisher,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets how many messages are fetched per pass.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Delivers up to one batch of pending messages.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_pending(&self) -> Result<DispatchReport> {
        let pending = self.store.fetch_pending(self.batch_size).await?;
        let mut report = DispatchReport::default();

        for message in pending {
            match self.publisher.publish(&message).await {
                Ok(()) => {
                    self.store.mark_dispatched(&[message.id]).await?;
                    metrics::counter!("outbox_messages_dispatched_total").increment(1);
                    report.delivered += 1;
                }
                Err(err) => {
                    let reason = err.to_string();
                    self.store
                        .record_dispatch_failure(message.id, &reason)
                        .await?;
                    metrics::counter!("outbox_dispatch_failures_total").increment(1);
                    tracing::warn!(
                        message_id = %message.id,
                        event_type = %message.event_type,
                        attempts = message.attempts + 1,
                        error = %reason,
                        "outbox delivery failed, will retry"
                    );
                    report.failed = Some((message.id, reason));
                    break;
                }
            }
        }

        if report.delivered > 0 {
            tracing::debug!(delivered = report.delivered, "outbox messages dispatched");
        }
        Ok(report)
    }

    /// Dispatches until nothing is pending or a delivery fails.
    pub async fn drain(&self) -> Result<DispatchReport> {
        let mut total = DispatchReport::default();
        loop {
            let report = self.dispatch_pending().await?;
            total.delivered += report.delivered;
            if report.has_failure() || report.delivered < self.batch_size {
                total.failed = report.failed;
                return Ok(total);
            }
        }
    }

    /// Dispatches on every tick of `interval` until `shutdown` resolves,
    /// then drains what is left.
    ///
    /// Store errors are logged and retried on the next tick.
    pub async fn run<F>(&self, interval: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            batch_size = self.batch_size,
            "outbox dispatcher started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.drain().await {
                        tracing::error!(error = %err, "outbox dispatch pass failed");
                    }
                }
            }
        }

        let report = self.drain().await?;
        tracing::info!(
            delivered = report.delivered,
            "outbox dispatcher stopped"
        );
        Ok(())
    }
}
